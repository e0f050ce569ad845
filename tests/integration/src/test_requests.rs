//! Request façade integration tests: cached views and body consumption.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures::StreamExt;
    use http::{Method, StatusCode};
    use strand_core::BodyFrame;
    use strand_http::{App, BodyError, Response};

    use crate::{get, perform, post, test_scope};

    #[tokio::test]
    async fn test_should_expose_method_and_url() {
        let mut app = App::new();
        app.get("/{rest}", |request| async move {
            Ok(Response::json(&serde_json::json!({
                "method": request.method().as_str(),
                "url": request.url().as_str(),
            }))?)
        })
        .unwrap();

        let response = get(&app, "/123?a=abc").await;
        assert_eq!(
            response.json(),
            serde_json::json!({"method": "GET", "url": "http://testserver/123?a=abc"})
        );
    }

    #[tokio::test]
    async fn test_should_parse_query_params() {
        let mut app = App::new();
        app.get("/", |request| async move {
            let params: serde_json::Map<String, serde_json::Value> = request
                .query_params()
                .iter()
                .map(|(k, v)| (k.to_owned(), serde_json::Value::from(v)))
                .collect();
            Ok(Response::json(&serde_json::json!({"params": params}))?)
        })
        .unwrap();

        let response = get(&app, "/?a=123&b=456").await;
        assert_eq!(
            response.json(),
            serde_json::json!({"params": {"a": "123", "b": "456"}})
        );
    }

    #[tokio::test]
    async fn test_should_expose_headers_case_insensitively() {
        let mut app = App::new();
        app.get("/", |request| async move {
            Ok(Response::json(&serde_json::json!({
                "host": request.headers().get("host"),
                "user-agent": request.headers().get("User-Agent"),
            }))?)
        })
        .unwrap();

        let scope = test_scope(Method::GET, "/")
            .with_header("Host", "example.org")
            .with_header("User-Agent", "strand-test/1.0");
        let response = perform(&app, scope, vec![BodyFrame::last(Bytes::new())]).await;
        assert_eq!(
            response.json(),
            serde_json::json!({"host": "example.org", "user-agent": "strand-test/1.0"})
        );
    }

    #[tokio::test]
    async fn test_should_parse_cookies() {
        let mut app = App::new();
        app.get("/", |request| async move {
            Ok(Response::plain_text(
                request.cookies().get("session").unwrap_or("none").to_owned(),
            ))
        })
        .unwrap();

        let scope =
            test_scope(Method::GET, "/").with_header("Cookie", "session=abc123; theme=dark");
        let response = perform(&app, scope, vec![BodyFrame::last(Bytes::new())]).await;
        assert_eq!(response.text(), "abc123");
    }

    #[tokio::test]
    async fn test_should_read_chunked_body_in_order() {
        let mut app = App::new();
        app.post("/", |mut request| async move {
            let body = request.body().await?;
            Ok(Response::content(body, mime::TEXT_PLAIN))
        })
        .unwrap();

        let response = perform(
            &app,
            test_scope(Method::POST, "/"),
            vec![
                BodyFrame::data(Bytes::from_static(b"hello, ")),
                BodyFrame::data(Bytes::from_static(b"world")),
                BodyFrame::last(Bytes::from_static(b"!")),
            ],
        )
        .await;
        assert_eq!(response.text(), "hello, world!");
    }

    #[tokio::test]
    async fn test_should_return_identical_bytes_on_repeated_body_calls() {
        let mut app = App::new();
        app.post("/", |mut request| async move {
            let first = request.body().await?;
            let second = request.body().await?;
            assert_eq!(first, second);
            Ok(Response::plain_text("consistent"))
        })
        .unwrap();

        let response = post(&app, "/", Bytes::from_static(b"payload")).await;
        assert_eq!(response.text(), "consistent");
    }

    #[tokio::test]
    async fn test_should_replay_cached_body_through_stream_after_body() {
        let mut app = App::new();
        app.post("/", |mut request| async move {
            let body = request.body().await?;
            let mut replayed = Vec::new();
            let mut stream = request.stream()?;
            while let Some(chunk) = stream.next().await {
                replayed.extend_from_slice(&chunk?);
            }
            assert_eq!(&replayed[..], &body[..]);
            Ok(Response::plain_text("replayed"))
        })
        .unwrap();

        let response = post(&app, "/", Bytes::from_static(b"echo me")).await;
        assert_eq!(response.text(), "replayed");
    }

    #[tokio::test]
    async fn test_should_reject_second_stream_without_materialized_body() {
        let mut app = App::new();
        app.post("/", |mut request| async move {
            let _first = request.stream()?;
            match request.stream() {
                Err(BodyError::AlreadyConsumed) => Ok(Response::plain_text("rejected")),
                Err(other) => Err(other.into()),
                Ok(_) => Ok(Response::plain_text("unexpectedly allowed")),
            }
        })
        .unwrap();

        let response = post(&app, "/", Bytes::from_static(b"x")).await;
        assert_eq!(response.text(), "rejected");
    }

    #[tokio::test]
    async fn test_should_surface_client_disconnect_to_handler() {
        let mut app = App::new();
        app.post("/", |mut request| async move {
            match request.body().await {
                Err(BodyError::ClientDisconnect) => Ok(Response::plain_text("disconnected")),
                Err(other) => Err(other.into()),
                Ok(_) => Ok(Response::plain_text("unexpected body")),
            }
        })
        .unwrap();

        let response = perform(
            &app,
            test_scope(Method::POST, "/"),
            vec![
                BodyFrame::data(Bytes::from_static(b"partial")),
                BodyFrame::Disconnect,
            ],
        )
        .await;
        assert_eq!(response.text(), "disconnected");
    }

    #[tokio::test]
    async fn test_should_decode_json_and_form_bodies() {
        let mut app = App::new();
        app.post("/json", |mut request| async move {
            let value: serde_json::Value = request.json().await?;
            Ok(Response::json(&value)?)
        })
        .unwrap();
        app.post("/form", |mut request| async move {
            let form = request.form().await?;
            Ok(Response::plain_text(format!(
                "{}/{}",
                form.get("name").unwrap_or("?"),
                form.get("id").unwrap_or("?"),
            )))
        })
        .unwrap();

        let response = post(&app, "/json", Bytes::from_static(br#"{"a": "123"}"#)).await;
        assert_eq!(response.json(), serde_json::json!({"a": "123"}));

        let response = post(&app, "/form", Bytes::from_static(b"name=alice&id=42")).await;
        assert_eq!(response.text(), "alice/42");
    }

    #[tokio::test]
    async fn test_should_report_malformed_json_as_decode_failure() {
        let mut app = App::new();
        app.post("/", |mut request| async move {
            match request.json::<serde_json::Value>().await {
                Err(BodyError::Json(_)) => Ok(Response::plain_text("decode error")),
                Err(other) => Err(other.into()),
                Ok(_) => Ok(Response::plain_text("unexpectedly parsed")),
            }
        })
        .unwrap();

        let response = post(&app, "/", Bytes::from_static(b"not json")).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), "decode error");
    }
}
