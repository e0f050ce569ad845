//! Exception-mapping integration tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::StatusCode;
    use strand_http::{App, Error, Handler, HttpError, Response, Route, Router};

    use crate::get;

    #[tokio::test]
    async fn test_should_use_registered_404_handler() {
        let mut app = App::new();
        app.exception_handler(StatusCode::NOT_FOUND, |_request, error| async move {
            Ok(Response::html("custom not found page").with_status(error.status))
        });

        let response = get(&app, "/missing").await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.text(), "custom not found page");
    }

    #[tokio::test]
    async fn test_should_use_registered_405_handler() {
        let mut app = App::new();
        app.post("/submit", |_request| async {
            Ok(Response::plain_text("submitted"))
        })
        .unwrap();
        app.exception_handler(StatusCode::METHOD_NOT_ALLOWED, |_request, error| async move {
            Ok(Response::html("method not matched").with_status(error.status))
        });

        let response = get(&app, "/submit").await;
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.text(), "method not matched");
    }

    #[tokio::test]
    async fn test_should_render_default_json_for_unregistered_status() {
        let mut app = App::new();
        app.get("/forbidden", |_request| async {
            Err(Error::Http(HttpError::new(
                StatusCode::FORBIDDEN,
                "no access",
            )))
        })
        .unwrap();

        let response = get(&app, "/forbidden").await;
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(
            response.json(),
            serde_json::json!({"status": 403, "detail": "no access"})
        );
    }

    #[tokio::test]
    async fn test_should_give_handler_the_request_scope() {
        let mut app = App::new();
        app.exception_handler(StatusCode::NOT_FOUND, |request, error| async move {
            Ok(
                Response::plain_text(format!("{} missed {}", error.status, request.path()))
                    .with_status(error.status),
            )
        });

        let response = get(&app, "/ghost").await;
        assert_eq!(response.text(), "404 Not Found missed /ghost");
    }

    #[tokio::test]
    async fn test_should_render_diagnostic_with_debug() {
        let mut app = App::new();
        app.set_debug(true);
        app.get("/debug", |_request| async {
            Err(Error::Internal(anyhow::anyhow!("attempted division by zero")))
        })
        .unwrap();

        let response = get(&app, "/debug").await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.text().contains("division by zero"));
    }

    #[tokio::test]
    async fn test_should_hide_diagnostic_details_in_production() {
        let mut app = App::new();
        app.get("/debug", |_request| async {
            Err(Error::Internal(anyhow::anyhow!("secret connection string")))
        })
        .unwrap();

        let response = get(&app, "/debug").await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.text(), "Internal Server Error");
    }

    #[tokio::test]
    async fn test_should_contain_handler_panic_as_diagnostic() {
        let mut app = App::new();
        app.set_debug(true);
        app.get("/panic", |_request| async { panic!("handler exploded") })
            .unwrap();

        let response = get(&app, "/panic").await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.text().contains("handler exploded"));
    }

    #[tokio::test]
    async fn test_should_recover_typed_failure_from_opaque_mount() {
        // A bare router mounted as an opaque sub-application reports its
        // 404 through the anyhow boundary; the outer layer recovers it.
        let mut inner = Router::new();
        inner.add_route(
            Route::new(
                "/known",
                Handler::from_async(|_request| async { Ok(Response::plain_text("inner")) }),
            )
            .unwrap(),
        );

        let mut app = App::new();
        app.mount("/inner", Arc::new(inner)).unwrap();

        let response = get(&app, "/inner/known").await;
        assert_eq!(response.text(), "inner");

        let response = get(&app, "/inner/unknown").await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.json()["status"], 404);
    }

    #[tokio::test]
    async fn test_should_let_inner_app_handle_its_own_failures() {
        let mut inner = App::new();
        inner.exception_handler(StatusCode::NOT_FOUND, |_request, error| async move {
            Ok(Response::plain_text("inner says no").with_status(error.status))
        });

        let mut app = App::new();
        app.mount("/sub", Arc::new(inner)).unwrap();

        let response = get(&app, "/sub/anything").await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.text(), "inner says no");
    }
}
