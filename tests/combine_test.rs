//! Tests for the transform chain.

use std::sync::{Arc, Mutex};

use fetchq::{Chain, Middleware, Queue, Request, Response};

type Rest = (&'static str, &'static str);

fn recording_doubler(calls: &Arc<Mutex<Vec<(i32, Rest)>>>) -> impl Fn(i32, &Rest) -> i32 + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move |n, rest| {
        calls.lock().unwrap().push((n, *rest));
        n * 2
    }
}

#[test]
fn stages_feed_each_other_and_share_the_rest() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let chain = Chain::new(recording_doubler(&calls))
        .then(recording_doubler(&calls))
        .then(recording_doubler(&calls));

    let out = chain.call(2, &("a", "b"));

    assert_eq!(out, 16);
    assert_eq!(
        *calls.lock().unwrap(),
        vec![(2, ("a", "b")), (4, ("a", "b")), (8, ("a", "b"))]
    );
}

#[test]
fn every_stage_runs_once() {
    let hits = Arc::new(Mutex::new(Vec::new()));
    let (a, b, c) = (Arc::clone(&hits), Arc::clone(&hits), Arc::clone(&hits));
    let chain = Chain::new(move |(), _: &()| a.lock().unwrap().push("fn1"))
        .then(move |(), _| b.lock().unwrap().push("fn2"))
        .then(move |(), _| c.lock().unwrap().push("fn3"));

    chain.call((), &());

    assert_eq!(chain.len(), 3);
    assert_eq!(*hits.lock().unwrap(), vec!["fn1", "fn2", "fn3"]);
}

#[tokio::test]
async fn chain_drives_a_response_stage() {
    let chain = Chain::new(|mut response: Response, request: &Request| {
        response.status_text = format!("via {}", request.url.as_deref().unwrap_or(""));
        response
    })
    .then(|mut response, _| {
        response.status_text.push('!');
        response
    });

    let transport = TestTransport;
    let middleware =
        Middleware::default().with_response(move |response: Response, request: &Request| {
            Ok(chain.call(response, request))
        });
    let queue = Queue::with_middleware(transport, middleware).unwrap();

    let response = queue
        .get(Request::new("http://test/"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.status_text, "via http://test/!");
}

struct TestTransport;

impl fetchq::Transport for TestTransport {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        _options: fetchq::FetchOptions,
    ) -> fetchq::middleware::BoxFuture<'a, Result<fetchq::RawResponse, fetchq::BoxError>> {
        Box::pin(std::future::ready(Ok(fetchq::RawResponse {
            status: 204,
            url: url.to_string(),
            ..Default::default()
        })))
    }
}
