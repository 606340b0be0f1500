//! Page tests against the mock transport

use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::{timeout, Instant};
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::cdp::protocol::{emulation, page as page_domain};
use crate::cdp::{CdpEvent, MockTransport};
use crate::error::CDP_SERVER_ERROR;

const SESSION: &str = "session-T1";

async fn setup_with(config: Config) -> (Arc<MockTransport>, Arc<Browser>, Arc<Page>) {
    let bus = EventBus::new();
    let mock = Arc::new(MockTransport::new(bus.clone()));
    let browser = Browser::new(mock.clone(), bus, config);
    let page = browser.page_from_target_id("T1".into()).await.unwrap();
    (mock, browser, page)
}

async fn setup() -> (Arc<MockTransport>, Arc<Browser>, Arc<Page>) {
    setup_with(Config::default()).await
}

fn context_destroyed() -> Error {
    Error::cdp(CDP_SERVER_ERROR, "Cannot find context with specified id")
}

fn request_sent(mock: &MockTransport, id: &str, url: &str) {
    mock.emit(
        Some(SESSION),
        "Network.requestWillBeSent",
        json!({ "requestId": id, "request": { "url": url, "method": "GET", "headers": {} } }),
    );
}

fn loading_finished(mock: &MockTransport, id: &str) {
    mock.emit(Some(SESSION), "Network.loadingFinished", json!({ "requestId": id }));
}

/// Serve one HTTP response on a local port
async fn serve_once(body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/zip\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    addr
}

// ---- session ----

#[tokio::test]
async fn test_attach_sequence() {
    let (mock, _browser, page) = setup().await;

    assert_eq!(
        mock.methods(),
        vec![
            "Target.attachToTarget",
            "Page.enable",
            "Network.enable",
            "DOM.getDocument"
        ]
    );

    let calls = mock.calls();
    assert!(calls[0].session_id.is_none());
    assert_eq!(calls[0].params, json!({ "targetId": "T1", "flatten": true }));
    assert!(calls[1..].iter().all(|c| c.session_id.as_deref() == Some(SESSION)));

    assert_eq!(page.session_id().as_str(), SESSION);
    assert_eq!(page.frame_id().as_str(), "FT1");
    assert!(!page.is_iframe());
}

#[tokio::test]
async fn test_frame_id_last_child_wins() {
    let bus = EventBus::new();
    let mock = Arc::new(MockTransport::new(bus.clone()));
    mock.on("DOM.getDocument", |_, _| {
        Ok(json!({
            "root": {
                "nodeId": 1,
                "children": [
                    { "nodeId": 2, "frameId": "A" },
                    { "nodeId": 3, "frameId": "" },
                    { "nodeId": 4, "frameId": "B" }
                ]
            }
        }))
    });
    let browser = Browser::new(mock.clone(), bus, Config::default());

    let page = browser.page_from_target_id("T1".into()).await.unwrap();
    assert_eq!(page.frame_id().as_str(), "B");
}

#[tokio::test]
async fn test_attach_failure_is_fatal() {
    let bus = EventBus::new();
    let mock = Arc::new(MockTransport::new(bus.clone()));
    mock.respond_once(
        "Target.attachToTarget",
        Err(Error::cdp(CDP_SERVER_ERROR, "No target with given id found")),
    );
    let browser = Browser::new(mock.clone(), bus, Config::default());

    let err = browser.page_from_target_id("T1".into()).await.unwrap_err();
    assert!(matches!(err, Error::Cdp { .. }));
    assert_eq!(mock.methods(), vec!["Target.attachToTarget"]);
    assert!(browser.pages().unwrap().is_empty());
}

#[tokio::test]
async fn test_enable_failure_aborts_init() {
    let bus = EventBus::new();
    let mock = Arc::new(MockTransport::new(bus.clone()));
    mock.respond_once("Network.enable", Err(Error::cdp(CDP_SERVER_ERROR, "boom")));
    let browser = Browser::new(mock.clone(), bus, Config::default());

    assert!(browser.page_from_target_id("T1".into()).await.is_err());
    assert!(mock.calls_to("DOM.getDocument").is_empty());
}

#[tokio::test]
async fn test_event_filter_is_session_scoped_multicast() {
    let (mock, _browser, page) = setup().await;
    let mut a = page.event().subscribe(CancellationToken::new());
    let mut b = page.event().subscribe(CancellationToken::new());

    mock.emit(Some("session-OTHER"), "Page.loadEventFired", json!({ "timestamp": 1.0 }));
    mock.emit(None, "Target.targetCreated", json!({}));
    mock.emit(Some(SESSION), "Page.loadEventFired", json!({ "timestamp": 2.0 }));

    for stream in [&mut a, &mut b] {
        let event = timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.session_id.as_deref(), Some(SESSION));
        assert_eq!(event.params["timestamp"], 2.0);
    }
}

// ---- navigation and accessors ----

#[tokio::test]
async fn test_navigate() {
    let (mock, _browser, page) = setup().await;

    assert_ok!(page.navigate("https://example.com/").await);

    let methods = mock.methods();
    let stop = methods.iter().position(|m| m == "Page.stopLoading").unwrap();
    let nav = methods.iter().position(|m| m == "Page.navigate").unwrap();
    assert!(stop < nav);
    assert_eq!(mock.calls_to("Page.navigate")[0].params["url"], "https://example.com/");
}

#[tokio::test]
async fn test_navigate_error_text() {
    let (mock, _browser, page) = setup().await;
    mock.respond_once(
        "Page.navigate",
        Ok(json!({ "frameId": "FT1", "errorText": "net::ERR_NAME_NOT_RESOLVED" })),
    );

    match page.navigate("https://nowhere.invalid/").await {
        Err(Error::Navigation(text)) => assert_eq!(text, "net::ERR_NAME_NOT_RESOLVED"),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_cookies_default_to_current_url() {
    let (mock, _browser, page) = setup().await;

    let cookies = page.cookies(&[]).await.unwrap();
    assert!(cookies.is_empty());

    assert_eq!(mock.calls_to("Target.getTargetInfo")[0].params["targetId"], "T1");
    assert_eq!(
        mock.calls_to("Network.getCookies")[0].params,
        json!({ "urls": ["https://example.com/"] })
    );
}

#[tokio::test]
async fn test_extra_headers_and_user_agent() {
    let (mock, _browser, page) = setup().await;

    page.set_extra_headers(&[("X-A", "1"), ("X-B", "2")]).await.unwrap();
    assert_eq!(
        mock.calls_to("Network.setExtraHTTPHeaders")[0].params,
        json!({ "headers": { "X-A": "1", "X-B": "2" } })
    );

    page.set_user_agent(None).await.unwrap();
    let params = &mock.calls_to("Network.setUserAgentOverride")[0].params;
    assert_eq!(params["userAgent"], Config::default().user_agent);
    assert_eq!(params["acceptLanguage"], "en");
    assert_eq!(params["platform"], "MacIntel");
}

#[tokio::test]
async fn test_window_bounds() {
    let (mock, _browser, page) = setup().await;

    let bounds = page.get_window().await.unwrap();
    assert_eq!(bounds.width, Some(1280));

    page.set_window(browser_domain::Bounds {
        window_state: Some("maximized".to_string()),
        ..Default::default()
    })
    .await
    .unwrap();
    assert_eq!(
        mock.calls_to("Browser.setWindowBounds")[0].params,
        json!({ "windowId": 1, "bounds": { "windowState": "maximized" } })
    );
}

#[tokio::test]
async fn test_close_unregisters_and_cancels() {
    let (mock, browser, page) = setup().await;

    page.close().await.unwrap();

    assert!(page.token().is_cancelled());
    assert!(browser.page(page.id()).is_err());
    assert_eq!(mock.calls_to("Page.close").len(), 1);
    assert!(page.stop_loading().await.unwrap_err().is_cancelled());
}

// ---- evaluation ----

#[tokio::test]
async fn test_eval_by_value_creates_context_once() {
    let (mock, _browser, page) = setup().await;
    mock.on("Runtime.callFunctionOn", |_, _| {
        Ok(json!({ "result": { "type": "number", "value": 42 } }))
    });

    let result = page.eval(true, None, "(a) => a + 41", &[json!(1)]).await.unwrap();
    assert_eq!(result.value, Some(json!(42)));
    page.eval(true, None, "() => 0", &[]).await.unwrap();

    let evaluate = mock.calls_to("Runtime.evaluate");
    assert_eq!(evaluate.len(), 1);
    let expression = evaluate[0].params["expression"].as_str().unwrap();
    assert!(expression.contains(r#"("FT1")"#));
    assert!(expression.ends_with("//# sourceURL=__chaser_helper__"));
    assert!(evaluate[0].params.get("contextId").is_none());

    let call = &mock.calls_to("Runtime.callFunctionOn")[0].params;
    assert_eq!(call["objectId"], "window-1");
    assert_eq!(
        call["functionDeclaration"],
        "function() { return ((a) => a + 41).apply(this, arguments) }"
    );
    assert_eq!(call["arguments"], json!([{ "value": 1 }]));
    assert_eq!(call["returnByValue"], true);
    assert_eq!(call["awaitPromise"], true);
}

#[tokio::test(start_paused = true)]
async fn test_eval_recovers_destroyed_context() {
    let (mock, _browser, page) = setup().await;
    mock.respond_once("Runtime.callFunctionOn", Err(context_destroyed()));

    assert_ok!(page.eval(true, None, "() => 1", &[]).await);

    assert_eq!(mock.calls_to("Runtime.evaluate").len(), 2);
    let receivers: Vec<Value> = mock
        .calls_to("Runtime.callFunctionOn")
        .iter()
        .map(|c| c.params["objectId"].clone())
        .collect();
    assert_eq!(receivers, vec![json!("window-1"), json!("window-2")]);
}

#[tokio::test(start_paused = true)]
async fn test_eval_recovers_when_context_dies_during_creation() {
    let (mock, _browser, page) = setup().await;
    mock.respond_once(
        "Runtime.evaluate",
        Err(Error::cdp(CDP_SERVER_ERROR, "Execution context was destroyed.")),
    );

    assert_ok!(page.eval(true, None, "() => 1", &[]).await);
    assert_eq!(mock.calls_to("Runtime.evaluate").len(), 2);
    assert_eq!(mock.calls_to("Runtime.callFunctionOn").len(), 1);
}

#[tokio::test]
async fn test_eval_explicit_receiver_is_not_refreshed() {
    let (mock, _browser, page) = setup().await;
    mock.respond_once("Runtime.callFunctionOn", Err(context_destroyed()));

    let receiver = RemoteObjectId::from("node-1");
    let err = page
        .eval(true, Some(&receiver), "function() { return this }", &[])
        .await
        .unwrap_err();

    assert!(err.is_context_destroyed());
    assert!(mock.calls_to("Runtime.evaluate").is_empty());
    assert_eq!(mock.calls_to("Runtime.callFunctionOn").len(), 1);
}

#[tokio::test]
async fn test_eval_exception() {
    let (mock, _browser, page) = setup().await;
    mock.on("Runtime.callFunctionOn", |_, _| {
        Ok(json!({
            "result": { "type": "object" },
            "exceptionDetails": {
                "text": "Uncaught",
                "exception": { "type": "object", "subtype": "error", "description": "Error: boom" }
            }
        }))
    });

    match page.eval(true, None, "() => { throw new Error('boom') }", &[]).await {
        Err(Error::Evaluation(description)) => assert_eq!(description, "Error: boom"),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_eval_stops_when_page_cancelled() {
    let (mock, _browser, page) = setup().await;
    mock.on("Runtime.callFunctionOn", |_, _| Err(context_destroyed()));

    let task = {
        let page = page.clone();
        tokio::spawn(async move { page.eval(true, None, "() => 1", &[]).await })
    };

    tokio::time::sleep(Duration::from_secs(5)).await;
    page.token().cancel();

    let result = timeout(Duration::from_secs(10), task).await.unwrap().unwrap();
    assert!(result.unwrap_err().is_cancelled());

    let attempts = mock.calls_to("Runtime.callFunctionOn").len();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(mock.calls_to("Runtime.callFunctionOn").len(), attempts);
}

#[tokio::test]
async fn test_trace_initializes_mouse_tracer() {
    let config = Config {
        trace: true,
        ..Config::default()
    };
    let (mock, _browser, page) = setup_with(config).await;

    page.eval(true, None, "() => 1", &[]).await.unwrap();

    let calls = mock.calls_to("Runtime.callFunctionOn");
    assert_eq!(calls.len(), 2);
    assert!(calls[0].params["functionDeclaration"]
        .as_str()
        .unwrap()
        .contains("rodFT1.initMouseTracer"));
    assert_eq!(calls[0].params["arguments"][0]["value"], page.mouse().id());
}

#[tokio::test]
async fn test_add_script_tag_uses_content_hash() {
    let (mock, _browser, page) = setup().await;

    page.add_script_tag("", "window.x = 1").await.unwrap();

    let call = &mock.calls_to("Runtime.callFunctionOn")[0].params;
    assert!(call["functionDeclaration"]
        .as_str()
        .unwrap()
        .contains("rodFT1.addScriptTag"));

    let expected = hex::encode(Sha256::digest(b"window.x = 1"));
    assert_eq!(call["arguments"][0]["value"], expected);
    assert_eq!(call["arguments"][1]["value"], "");
    assert_eq!(call["arguments"][2]["value"], "window.x = 1");
}

#[tokio::test]
async fn test_wait_idle_passes_seconds() {
    let (mock, _browser, page) = setup().await;

    page.wait_idle(Duration::from_millis(2500)).await.unwrap();

    let call = &mock.calls_to("Runtime.callFunctionOn")[0].params;
    assert!(call["functionDeclaration"].as_str().unwrap().contains("rodFT1.waitIdle"));
    assert_eq!(call["arguments"], json!([{ "value": 2.5 }]));
}

// ---- iframes ----

#[tokio::test]
async fn test_iframe_uses_isolated_world() {
    let (mock, browser, page) = setup().await;
    mock.on("DOM.describeNode", |_, _| {
        Ok(json!({ "node": { "nodeId": 5, "nodeName": "IFRAME", "frameId": "child" } }))
    });

    let element = page.element_from_object_id("iframe-1".into());
    let frame = element.frame().await.unwrap();

    assert!(frame.is_iframe());
    assert_eq!(frame.frame_id().as_str(), "child");
    assert_eq!(frame.session_id(), page.session_id());
    assert_eq!(frame.parent_element().map(|e| e.as_str()), Some("iframe-1"));
    assert!(Arc::ptr_eq(&frame.root().unwrap(), &page));
    assert!(Arc::ptr_eq(&page.root().unwrap(), &page));
    assert_eq!(browser.pages().unwrap().len(), 2);

    frame.eval(true, None, "() => 1", &[]).await.unwrap();

    let world = mock.calls_to("Page.createIsolatedWorld");
    assert_eq!(world.len(), 1);
    assert_eq!(world[0].params["frameId"], "child");
    assert_eq!(mock.calls_to("Runtime.evaluate")[0].params["contextId"], 7);

    page.token().cancel();
    assert!(frame.token().is_cancelled());
}

fn describe_as_iframe(mock: &MockTransport) {
    mock.on("DOM.describeNode", |_, _| {
        Ok(json!({ "node": { "nodeId": 5, "nodeName": "IFRAME", "frameId": "child" } }))
    });
}

#[tokio::test]
async fn test_iframe_page_is_reused() {
    let (mock, browser, page) = setup().await;
    describe_as_iframe(&mock);

    let element = page.element_from_object_id("iframe-1".into());
    let first = element.frame().await.unwrap();
    for _ in 0..2 {
        assert!(Arc::ptr_eq(&element.frame().await.unwrap(), &first));
    }

    // Another handle to the same iframe resolves to the same page too
    let again = page.element_from_object_id("iframe-2".into());
    assert!(Arc::ptr_eq(&again.frame().await.unwrap(), &first));
    assert_eq!(browser.pages().unwrap().len(), 2);
}

#[tokio::test]
async fn test_iframe_pages_leave_with_parent() {
    let (mock, browser, page) = setup().await;
    describe_as_iframe(&mock);

    let frame = page
        .element_from_object_id("iframe-1".into())
        .frame()
        .await
        .unwrap();
    assert_eq!(browser.pages().unwrap().len(), 2);

    page.close().await.unwrap();
    assert!(frame.token().is_cancelled());
    assert!(browser.pages().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelled_pages_leave_arena() {
    let (mock, browser, page) = setup().await;
    describe_as_iframe(&mock);
    page.element_from_object_id("iframe-1".into())
        .frame()
        .await
        .unwrap();

    page.token().cancel();

    timeout(Duration::from_secs(1), async {
        while !browser.pages().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_element_without_frame() {
    let (_mock, _browser, page) = setup().await;

    let element = page.element_from_object_id("div-1".into());
    assert!(matches!(element.frame().await, Err(Error::PageNotFound(_))));
}

// ---- waits ----

#[tokio::test]
async fn test_wait_event_is_single_use() {
    let (mock, _browser, page) = setup().await;

    let mut waiter = page.wait_event::<page_domain::LoadEventFired>();
    mock.emit(Some(SESSION), "Page.frameNavigated", json!({ "frame": { "id": "FT1" } }));
    mock.emit(Some(SESSION), "Page.loadEventFired", json!({ "timestamp": 12.5 }));

    let event = timeout(Duration::from_secs(1), waiter.wait()).await.unwrap().unwrap();
    assert_eq!(event.timestamp, 12.5);

    assert!(waiter.is_consumed());
    assert!(matches!(waiter.wait().await, Err(Error::WaitConsumed)));
}

#[tokio::test]
async fn test_wait_cancelled_by_close() {
    let (_mock, _browser, page) = setup().await;

    let mut waiter = page.wait_event::<page_domain::LoadEventFired>();
    page.close().await.unwrap();

    let result = timeout(Duration::from_secs(1), waiter.wait()).await.unwrap();
    assert!(result.unwrap_err().is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_request_idle_waits_full_duration_after_last_request() {
    let (mock, _browser, page) = setup().await;
    let start = Instant::now();

    let mut waiter = page
        .wait_request_idle(Duration::from_millis(500), &[], &[])
        .unwrap();
    request_sent(&mock, "R1", "https://example.com/api");

    tokio::time::sleep(Duration::from_millis(300)).await;
    loading_finished(&mock, "R1");

    waiter.wait().await.unwrap();
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(800), "finished early: {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(850), "finished late: {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_request_idle_ignores_excluded() {
    let (mock, _browser, page) = setup().await;
    let start = Instant::now();

    let mut waiter = page
        .wait_request_idle(Duration::from_millis(500), &[], &[r"\.png$"])
        .unwrap();
    request_sent(&mock, "IMG", "https://example.com/logo.png");

    waiter.wait().await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(550));
}

#[tokio::test(start_paused = true)]
async fn test_request_idle_cancelled() {
    let (mock, _browser, page) = setup().await;

    let mut waiter = page
        .wait_request_idle(Duration::from_millis(500), &[], &[])
        .unwrap();
    request_sent(&mock, "R1", "https://example.com/slow");

    tokio::time::sleep(Duration::from_secs(2)).await;
    page.token().cancel();

    assert!(waiter.wait().await.unwrap_err().is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_request_idle_ends_when_stream_closes() {
    let (mock, browser, page) = setup().await;

    let mut waiter = page
        .wait_request_idle(Duration::from_millis(500), &[], &[])
        .unwrap();
    request_sent(&mock, "R1", "https://example.com/slow");
    tokio::time::sleep(Duration::from_secs(1)).await;

    browser.event().close();
    assert_ok!(waiter.wait().await);
}

#[tokio::test]
async fn test_request_idle_survives_event_burst() {
    let (mock, _browser, page) = setup().await;

    let mut waiter = page
        .wait_request_idle(Duration::from_millis(200), &[], &[])
        .unwrap();
    request_sent(&mock, "R1", "https://example.com/api");
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Far more events than any buffer, all queued before the waiter runs
    loading_finished(&mock, "R1");
    for _ in 0..1100 {
        mock.emit(Some(SESSION), "Page.frameNavigated", json!({ "frame": { "id": "FT1" } }));
    }

    let result = timeout(Duration::from_secs(3), waiter.wait()).await.unwrap();
    assert_ok!(result);
}

#[tokio::test]
async fn test_request_idle_rejects_bad_pattern() {
    let (_mock, _browser, page) = setup().await;
    assert!(matches!(
        page.wait_request_idle(Duration::from_millis(10), &["("], &[]),
        Err(Error::InvalidPattern(_))
    ));
}

#[tokio::test]
async fn test_wait_open() {
    let (mock, browser, page) = setup().await;

    let mut waiter = page.wait_open().unwrap();
    mock.emit(
        None,
        "Target.targetCreated",
        json!({ "targetInfo": { "targetId": "T8", "type": "page", "openerId": "T7" } }),
    );
    mock.emit(
        None,
        "Target.targetCreated",
        json!({ "targetInfo": { "targetId": "T2", "type": "page", "openerId": "T1" } }),
    );

    let opened = timeout(Duration::from_secs(1), waiter.wait()).await.unwrap().unwrap();
    assert_eq!(opened.target_id().as_str(), "T2");
    assert_eq!(opened.session_id().as_str(), "session-T2");
    assert_eq!(browser.pages().unwrap().len(), 2);
}

#[tokio::test]
async fn test_pause_blocks_until_resumed() {
    let (mock, _browser, page) = setup().await;
    mock.on("Debugger.pause", |call, bus| {
        bus.publish(CdpEvent {
            method: "Debugger.resumed".to_string(),
            params: Value::Null,
            session_id: call.session_id.clone(),
        });
        Ok(json!({}))
    });

    timeout(Duration::from_secs(1), page.pause()).await.unwrap().unwrap();

    let methods = mock.methods();
    let enable = methods.iter().position(|m| m == "Debugger.enable").unwrap();
    let pause = methods.iter().position(|m| m == "Debugger.pause").unwrap();
    assert!(enable < pause);
}

#[tokio::test]
async fn test_handle_dialog() {
    let (mock, _browser, page) = setup().await;

    let mut handled = page.handle_dialog(true, Some("yes".to_string()));
    assert!(mock.calls_to("Page.handleJavaScriptDialog").is_empty());

    mock.emit(
        Some(SESSION),
        "Page.javascriptDialogOpening",
        json!({ "url": "https://example.com/", "message": "Sure?", "type": "prompt" }),
    );

    timeout(Duration::from_secs(1), handled.wait()).await.unwrap().unwrap();
    assert_eq!(
        mock.calls_to("Page.handleJavaScriptDialog")[0].params,
        json!({ "accept": true, "promptText": "yes" })
    );
}

// ---- screenshots ----

#[tokio::test]
async fn test_full_page_screenshot_restores_viewport_on_failure() {
    let (mock, _browser, page) = setup().await;
    let prior = emulation::SetDeviceMetricsOverride {
        width: 800,
        height: 600,
        device_scale_factor: 2.0,
        mobile: false,
    };
    page.set_viewport(prior.clone()).await.unwrap();
    mock.respond_once(
        "Page.captureScreenshot",
        Err(Error::cdp(CDP_SERVER_ERROR, "Unable to capture screenshot")),
    );

    let result = page.screenshot(true, &page_domain::CaptureScreenshot::default()).await;
    assert!(matches!(result, Err(Error::Cdp { .. })));

    let overrides: Vec<Value> = mock
        .calls_to("Emulation.setDeviceMetricsOverride")
        .into_iter()
        .map(|c| c.params)
        .collect();
    assert_eq!(
        overrides,
        vec![
            json!({ "width": 800, "height": 600, "deviceScaleFactor": 2.0, "mobile": false }),
            json!({ "width": 1280, "height": 2400, "deviceScaleFactor": 2.0, "mobile": false }),
            json!({ "width": 800, "height": 600, "deviceScaleFactor": 2.0, "mobile": false }),
        ]
    );
    assert_eq!(page.viewport(), Some(prior));
}

#[tokio::test]
async fn test_full_page_screenshot_without_prior_viewport() {
    let (mock, _browser, page) = setup().await;

    let data = page
        .screenshot(true, &page_domain::CaptureScreenshot::default())
        .await
        .unwrap();
    assert_eq!(data, b"mock");

    let set = mock.calls_to("Emulation.setDeviceMetricsOverride");
    assert_eq!(set.len(), 1);
    assert_eq!(
        set[0].params,
        json!({ "width": 1280, "height": 2400, "deviceScaleFactor": 1.0, "mobile": false })
    );
    assert_eq!(mock.calls_to("Emulation.clearDeviceMetricsOverride").len(), 1);
    assert_eq!(page.viewport(), None);
}

#[tokio::test]
async fn test_plain_screenshot_and_pdf() {
    let (mock, _browser, page) = setup().await;

    let shot = page
        .screenshot(
            false,
            &page_domain::CaptureScreenshot {
                format: Some("jpeg".to_string()),
                quality: Some(80),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(shot, b"mock");
    assert!(mock.calls_to("Emulation.setDeviceMetricsOverride").is_empty());
    assert_eq!(
        mock.calls_to("Page.captureScreenshot")[0].params,
        json!({ "format": "jpeg", "quality": 80 })
    );

    let pdf = page.pdf(&page_domain::PrintToPdf::default()).await.unwrap();
    assert_eq!(pdf, b"mock");
}

// ---- downloads ----

#[tokio::test]
async fn test_download_proxies_paused_request() {
    let (mock, _browser, page) = setup().await;
    let addr = serve_once("hello").await;

    let mut download = page.get_download_file("/tmp/downloads", "*.zip").await.unwrap();

    assert_eq!(
        mock.calls_to("Page.setDownloadBehavior")[0].params,
        json!({ "behavior": "allow", "downloadPath": "/tmp/downloads" })
    );
    assert_eq!(
        mock.calls_to("Fetch.enable")[0].params,
        json!({ "patterns": [{ "urlPattern": "*.zip" }] })
    );

    mock.emit(
        Some(SESSION),
        "Fetch.requestPaused",
        json!({
            "requestId": "P1",
            "request": { "url": format!("http://{}/file.zip", addr), "method": "GET", "headers": { "X-Test": "1" } },
            "resourceType": "Document"
        }),
    );

    let file = timeout(Duration::from_secs(5), download.wait()).await.unwrap().unwrap();
    assert_eq!(file.status, 200);
    assert_eq!(&file.body[..], b"hello");
    assert_eq!(file.headers["content-type"], "application/zip");

    let fulfill = &mock.calls_to("Fetch.fulfillRequest")[0].params;
    assert_eq!(fulfill["requestId"], "P1");
    assert_eq!(fulfill["responseCode"], 200);
    assert_eq!(fulfill["body"], "aGVsbG8=");
    assert!(fulfill["responseHeaders"]
        .as_array()
        .unwrap()
        .iter()
        .any(|h| h["name"] == "content-length" && h["value"] == "5"));

    assert_eq!(mock.methods().last().map(String::as_str), Some("Fetch.disable"));
}

#[tokio::test]
async fn test_download_intercepts_everything_without_pattern() {
    let (mock, _browser, page) = setup().await;

    let _download = page.get_download_file("/tmp", "").await.unwrap();
    assert_eq!(mock.calls_to("Fetch.enable")[0].params, json!({}));
}

#[tokio::test]
async fn test_concurrent_downloads_serialize() {
    let (mock, _browser, page) = setup().await;

    let first = page.get_download_file("/tmp", "").await.unwrap();

    let second = {
        let page = page.clone();
        tokio::spawn(async move { page.get_download_file("/tmp", "").await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!second.is_finished());
    assert_eq!(mock.calls_to("Page.setDownloadBehavior").len(), 1);

    // Dropping the handle ends the first interception and frees the lock
    drop(first);

    let second = timeout(Duration::from_secs(1), second).await.unwrap().unwrap();
    assert!(second.is_ok());
    assert_eq!(mock.calls_to("Page.setDownloadBehavior").len(), 2);

    // The abandoned interception was turned off before the next one armed
    let methods = mock.methods();
    let disable = methods.iter().position(|m| m == "Fetch.disable").unwrap();
    let rearm = methods.iter().rposition(|m| m == "Fetch.enable").unwrap();
    assert!(disable < rearm);
}

#[tokio::test]
async fn test_download_failure_still_disables_interception() {
    let (mock, _browser, page) = setup().await;

    let mut download = page.get_download_file("/tmp", "").await.unwrap();
    mock.emit(
        Some(SESSION),
        "Fetch.requestPaused",
        json!({ "requestId": "P1", "request": { "url": "http://127.0.0.1:1/file", "method": "GET", "headers": {} } }),
    );

    let result = timeout(Duration::from_secs(10), download.wait()).await.unwrap();
    assert!(matches!(result, Err(Error::Http(_))));
    assert!(mock.calls_to("Fetch.fulfillRequest").is_empty());
    assert_eq!(mock.calls_to("Fetch.disable").len(), 1);

    let next = timeout(Duration::from_secs(1), page.get_download_file("/tmp", "")).await;
    assert!(next.unwrap().is_ok());
}

#[tokio::test]
async fn test_download_arm_failure_releases_lock() {
    let (mock, _browser, page) = setup().await;
    mock.respond_once("Fetch.enable", Err(Error::cdp(CDP_SERVER_ERROR, "boom")));

    assert!(page.get_download_file("/tmp", "").await.is_err());

    let next = timeout(Duration::from_secs(1), page.get_download_file("/tmp", "")).await;
    assert!(next.unwrap().is_ok());
}

#[tokio::test]
async fn test_sleeper_uses_configured_backoff() {
    let (_mock, _browser, page) = setup().await;
    let mut sleeper = page.sleeper();

    let first = sleeper.next_interval();
    assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(150));
    for _ in 0..10 {
        assert!(sleeper.next_interval() <= Duration::from_secs(1));
    }
}
