//! Dispatcher behavior over a scaffolded project.

use std::fs;
use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, StatusCode};
use tempfile::TempDir;

use tatami_config::Mode;
use tatami_server::{
    HandlerArgs, HandlerResult, Request, RequestHandler, RouteModule, ServerBuildCell,
    ServerBuildLoader,
};

fn scaffold() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("src/routes")).unwrap();
    fs::create_dir_all(root.join("src/layouts")).unwrap();
    fs::create_dir_all(root.join("src/sections")).unwrap();
    fs::write(root.join("src/entry-client.ts"), "export {};\n").unwrap();
    fs::write(root.join("src/entry-server.ts"), "export {};\n").unwrap();
    fs::write(root.join("src/routes/index.ts"), "export const get = 1;\n").unwrap();
    fs::write(root.join("src/routes/boom.ts"), "export const get = 1;\n").unwrap();
    fs::write(
        root.join("src/sections/index.html"),
        "<main>Welcome home</main>",
    )
    .unwrap();
    fs::write(
        root.join("src/layouts/404.html"),
        "<html><body>{{ raw_html }}</body></html>",
    )
    .unwrap();
    fs::write(
        root.join("src/layouts/500.html"),
        "<html><body><h1>{{ error.message }}</h1>{{ raw_html }}</body></html>",
    )
    .unwrap();
    dir
}

struct ExplodingModule;

#[async_trait]
impl RouteModule for ExplodingModule {
    fn methods(&self) -> &[tatami_server::Method] {
        &[tatami_server::Method::Get]
    }

    async fn handle(
        &self,
        _method: tatami_server::Method,
        _args: HandlerArgs<'_>,
    ) -> HandlerResult {
        Err(anyhow::anyhow!("kaboom"))
    }
}

fn handler(dir: &TempDir) -> RequestHandler {
    let mut loader = ServerBuildLoader::new(dir.path(), Mode::Development);
    loader.register("boom", Arc::new(ExplodingModule));
    let build = loader.load().unwrap();
    RequestHandler::new(Arc::new(ServerBuildCell::new(build)), Mode::Development)
}

fn body_text(response: &tatami_server::Response) -> String {
    String::from_utf8(response.body().to_vec()).unwrap()
}

#[tokio::test]
async fn test_get_index_renders_route_template() {
    let dir = scaffold();
    let handler = handler(&dir);

    let response = handler.handle(&Request::get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(&response).contains("<main>Welcome home</main>"));
}

#[tokio::test]
async fn test_missing_route_renders_404_layout() {
    let dir = scaffold();
    let handler = handler(&dir);

    let response = handler.handle(&Request::get("/no-such-page")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_text(&response);
    assert!(body.contains("<pre><code>Not Found.</code></pre>"));
    assert_eq!(
        response.headers()[http::header::CONTENT_TYPE],
        "text/html; charset=utf-8"
    );
}

#[tokio::test]
async fn test_method_without_handler_is_404() {
    let dir = scaffold();
    let handler = handler(&dir);

    // The index route only carries GET.
    let response = handler
        .handle(&Request::with_method(Method::POST, "/"))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(&response).contains("Not Found."));
}

#[tokio::test]
async fn test_unknown_method_is_405_before_matching() {
    let dir = scaffold();
    let handler = handler(&dir);

    // Even a perfectly matchable path is rejected first.
    let response = handler
        .handle(&Request::with_method(Method::TRACE, "/"))
        .await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body_text(&response), "Method not Allowed");
    assert_eq!(
        response.headers()[http::header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
}

#[tokio::test]
async fn test_handler_error_is_500_and_artifact_survives() {
    let dir = scaffold();
    let handler = handler(&dir);

    let response = handler.handle(&Request::get("/boom")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(&response);
    assert!(body.contains("<h1>kaboom</h1>"));
    // Development mode: stack detail present.
    assert!(body.contains("kaboom"));

    // The failure poisons nothing; the next request serves normally.
    let response = handler.handle(&Request::get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_head_preserves_status_and_headers_without_body() {
    let dir = scaffold();
    let handler = handler(&dir);

    let get = handler.handle(&Request::get("/")).await;
    let head = handler
        .handle(&Request::with_method(Method::HEAD, "/"))
        .await;

    assert_eq!(head.status(), get.status());
    assert_eq!(
        head.headers().get(http::header::CONTENT_TYPE),
        get.headers().get(http::header::CONTENT_TYPE)
    );
    assert!(head.body().is_empty());
    assert!(!get.body().is_empty());
}

#[tokio::test]
async fn test_markdown_contents_reach_render_context() {
    let dir = scaffold();
    let root = dir.path();
    fs::write(root.join("tatami.toml"), "[markdown]\nenable = true\n").unwrap();
    fs::create_dir_all(root.join("src/contents")).unwrap();
    fs::write(
        root.join("src/contents/welcome.md"),
        "---\ntitle: Fresh tatami\n---\nStraw smells best when new.\n",
    )
    .unwrap();
    fs::write(root.join("src/routes/docs.ts"), "export const get = 1;\n").unwrap();
    fs::write(
        root.join("src/sections/docs.html"),
        "<article><h1>{{ markdown_contents[0].data.title }}</h1>{{ markdown_contents[0].content }}</article>",
    )
    .unwrap();

    let handler = handler(&dir);
    let response = handler.handle(&Request::get("/docs")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(&response);
    assert!(body.contains("<h1>Fresh tatami</h1>"));
    assert!(body.contains("Straw smells best when new."));
}

#[tokio::test]
async fn test_query_and_params_reach_handlers() {
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Capture {
        seen: Arc<Mutex<Option<(String, String)>>>,
    }

    #[async_trait]
    impl RouteModule for Capture {
        fn methods(&self) -> &[tatami_server::Method] {
            &[tatami_server::Method::Get]
        }

        async fn handle(
            &self,
            _method: tatami_server::Method,
            args: HandlerArgs<'_>,
        ) -> HandlerResult {
            *self.seen.lock() = Some((
                args.params["slug"].clone(),
                args.query["tab"].clone(),
            ));
            Ok(tatami_server::render("ok", StatusCode::OK))
        }
    }

    let dir = scaffold();
    fs::create_dir_all(dir.path().join("src/routes/blog")).unwrap();
    fs::write(
        dir.path().join("src/routes/blog/[slug].ts"),
        "export const get = 1;\n",
    )
    .unwrap();

    let seen = Arc::new(Mutex::new(None));
    let mut loader = ServerBuildLoader::new(dir.path(), Mode::Development);
    loader.register("blog/[slug]", Arc::new(Capture { seen: Arc::clone(&seen) }));
    let build = loader.load().unwrap();
    let handler = RequestHandler::new(Arc::new(ServerBuildCell::new(build)), Mode::Development);

    let response = handler
        .handle(&Request::get("/blog/first-post?tab=comments"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        seen.lock().clone(),
        Some(("first-post".to_string(), "comments".to_string()))
    );
}
