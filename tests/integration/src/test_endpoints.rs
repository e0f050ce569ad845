//! Stateful endpoint integration tests.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::StatusCode;
    use strand_http::{App, Endpoint, Error, Request, Response};

    use crate::{get, post};

    struct Homepage;

    #[async_trait::async_trait]
    impl Endpoint for Homepage {
        async fn get(&self, request: Request) -> Result<Response, Error> {
            match request.path_param("username") {
                Some(username) => Ok(Response::plain_text(format!("Hello, {username}!"))),
                None => Ok(Response::plain_text("Hello, world!")),
            }
        }
    }

    fn fixture() -> App {
        let mut app = App::new();
        app.endpoint("/", Homepage).unwrap();
        app.endpoint("/{username}", Homepage).unwrap();
        app
    }

    #[tokio::test]
    async fn test_should_serve_endpoint_route() {
        let app = fixture();
        let response = get(&app, "/").await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), "Hello, world!");
    }

    #[tokio::test]
    async fn test_should_pass_path_params_to_endpoint() {
        let app = fixture();
        let response = get(&app, "/tomchristie").await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), "Hello, tomchristie!");
    }

    #[tokio::test]
    async fn test_should_report_405_for_unimplemented_entry_point() {
        // The default method set allows POST, but `Homepage` implements only
        // `get`: the fall-through must surface as a typed 405, not an empty
        // response.
        let app = fixture();
        let response = post(&app, "/", Bytes::new()).await;
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.json()["status"], 405);
    }

    struct Counter {
        hits: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Endpoint for Counter {
        async fn get(&self, _request: Request) -> Result<Response, Error> {
            let n = self
                .hits
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
                + 1;
            Ok(Response::plain_text(n.to_string()))
        }
    }

    #[tokio::test]
    async fn test_should_keep_endpoint_state_across_requests() {
        let mut app = App::new();
        app.endpoint(
            "/count",
            Counter {
                hits: std::sync::atomic::AtomicUsize::new(0),
            },
        )
        .unwrap();

        assert_eq!(get(&app, "/count").await.text(), "1");
        assert_eq!(get(&app, "/count").await.text(), "2");
    }
}
