mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::Harness;
use palette_light::interface::controller::{Controller, LightConfig};
use palette_light::resource::controller::nanoleaf::{
    NanoleafController, ACTION_PAIRING, ACTION_PAIRING_FAILED, ACTION_PAIRING_PROGRESS,
    ACTION_PAIRING_SUCCESS,
};
use palette_light::resource::driver::http::Method;
use palette_light::resource::driver::mdns::DiscoveredService;
use palette_light::{ColorPalette, Error, RgbColor};
use serde_json::json;

const HOST: &str = "10.0.0.5";
const BASE: &str = "http://10.0.0.5:16021";

fn api(token: &str, endpoint: &str) -> String {
    format!("{BASE}/api/v1/{token}{endpoint}")
}

fn layout(ids: &[(u32, u32)]) -> serde_json::Value {
    let positions: Vec<_> = ids
        .iter()
        .map(|(id, shape)| json!({"panelId": id, "x": 0, "y": 0, "o": 0, "shapeType": shape}))
        .collect();
    json!({ "numPanels": ids.len(), "positionData": positions })
}

fn paired(h: &Harness, panels: &[(u32, u32)]) -> NanoleafController {
    h.http.respond(Method::Get, &api("tok", "/"), 200, json!({"name": "Shapes"}));
    h.http
        .respond(Method::Get, &api("tok", "/panelLayout/layout"), 200, layout(panels));
    h.http.respond(Method::Put, &api("tok", "/effects"), 204, json!(null));
    h.http.respond(Method::Put, &api("tok", "/state"), 204, json!(null));

    let mut config = LightConfig::new("nanoleaf", HOST, 16021);
    config.auth_token = "tok".into();

    let mut controller = NanoleafController::new(&h.ctx);
    controller.initialize(&config).unwrap();
    controller
}

#[test]
fn stored_token_makes_controller_ready() {
    let h = Harness::new();
    let controller = paired(&h, &[(1, 7)]);
    assert!(controller.is_ready());
    assert_eq!(controller.device_name(), "Shapes");
    assert_eq!(controller.panels().len(), 1);
}

#[test]
fn each_panel_takes_palette_colour_modulo_length() {
    let h = Harness::new();
    // Panel 99 is the Shapes controller and must be skipped.
    let mut controller = paired(&h, &[(99, 12), (11, 7), (12, 7), (13, 7)]);

    let palette = ColorPalette::new([RgbColor::RED, RgbColor::GREEN]);
    controller.display_palette(&palette).unwrap();

    let body = h.http.last_body(Method::Put, &api("tok", "/effects"));
    assert_eq!(body["write"]["animType"], "static");
    assert_eq!(
        body["write"]["animData"],
        "3 11 1 255 0 0 0 20 12 1 0 255 0 0 20 13 1 255 0 0 0 20"
    );
    assert_eq!(body["write"]["palette"].as_array().unwrap().len(), 2);
}

#[test]
fn empty_topology_sends_one_solid_command() {
    let h = Harness::new();
    let mut controller = paired(&h, &[]);

    controller
        .display_palette(&ColorPalette::new([RgbColor::BLUE]))
        .unwrap();

    let puts = h.http.requests_to(Method::Put, &api("tok", "/effects"));
    assert_eq!(puts.len(), 1);
    let body = puts[0].body.clone().unwrap();
    assert_eq!(body["write"]["animType"], "solid");
    assert_eq!(
        body["write"]["palette"][0],
        json!({"hue": 240, "saturation": 100, "brightness": 100})
    );
}

#[test]
fn brightness_is_clamped_to_percent() {
    let h = Harness::new();
    let mut controller = paired(&h, &[(1, 7)]);
    let url = api("tok", "/state");

    controller.set_brightness(-40).unwrap();
    assert_eq!(h.http.last_body(Method::Put, &url), json!({"brightness": {"value": 0}}));

    controller.set_brightness(250).unwrap();
    assert_eq!(h.http.last_body(Method::Put, &url), json!({"brightness": {"value": 100}}));
}

#[test]
fn without_token_display_is_refused() {
    let h = Harness::new();
    let mut controller = NanoleafController::new(&h.ctx);
    controller
        .initialize(&LightConfig::new("nanoleaf", HOST, 16021))
        .unwrap();

    assert!(!controller.is_ready());
    assert!(matches!(
        controller.display_palette(&ColorPalette::new([RgbColor::RED])),
        Err(Error::NotAuthenticated)
    ));
    assert!(h.http.requests().is_empty());
}

#[test]
fn empty_discovery_never_attempts_pairing() {
    let h = Harness::new();
    let mut controller = NanoleafController::new(&h.ctx);
    controller
        .initialize(&LightConfig::new("nanoleaf", "", 0))
        .unwrap();

    let result = controller.authenticate();

    assert!(matches!(result, Err(Error::DiscoveryFailed(_))));
    assert_eq!(h.browser.queries.load(Ordering::SeqCst), 5);
    assert!(h
        .http
        .requests()
        .iter()
        .all(|r| !r.url.ends_with("/api/v1/new")));
    // Backoff between the five queries: 2 + 3 + 4.5 + 6.75 seconds.
    assert_eq!(h.clock.elapsed(), Duration::from_millis(16_250));
}

#[test]
fn forbidden_pairing_times_out_with_one_failure_notice() {
    let h = Harness::new();
    h.http
        .respond(Method::Post, &format!("{BASE}/api/v1/new"), 403, json!(null));

    let mut controller = NanoleafController::new(&h.ctx);
    controller
        .initialize(&LightConfig::new("nanoleaf", HOST, 16021))
        .unwrap();

    let result = controller.authenticate();
    assert!(matches!(result, Err(Error::PairingTimeout(30))));
    assert!(h.clock.elapsed() >= Duration::from_secs(30));
    assert!(!controller.is_ready());

    let notes = h.drain_notifications();
    let count = |action: &str| notes.iter().filter(|n| n.action == action).count();
    assert_eq!(notes[0].action, ACTION_PAIRING);
    assert_eq!(notes[0].timeout_secs, 30);
    assert_eq!(count(ACTION_PAIRING_FAILED), 1);

    // 2 s polls over 30 s: progress on attempts 1, 6 and 11.
    let remaining: Vec<u32> = notes
        .iter()
        .filter(|n| n.action == ACTION_PAIRING_PROGRESS)
        .map(|n| n.timeout_secs)
        .collect();
    assert_eq!(remaining, vec![30, 20, 10]);
    assert_eq!(count(ACTION_PAIRING_SUCCESS), 0);
    assert_eq!(notes.last().unwrap().action, ACTION_PAIRING_FAILED);
}

#[test]
fn discovery_then_pairing_yields_host_and_token_patch() {
    let h = Harness::new();
    h.browser.services.lock().unwrap().push(DiscoveredService {
        hostname: "Shapes 1A2B._nanoleafapi._tcp.local.".into(),
        address: "10.0.0.9".into(),
        port: 16021,
    });
    h.http.respond(
        Method::Post,
        "http://10.0.0.9:16021/api/v1/new",
        200,
        json!({"auth_token": "fresh"}),
    );

    let mut controller = NanoleafController::new(&h.ctx);
    controller
        .initialize(&LightConfig::new("nanoleaf", "", 0))
        .unwrap();

    let patch = controller.authenticate().unwrap();
    assert_eq!(patch.host.as_deref(), Some("10.0.0.9"));
    assert_eq!(patch.port, Some(16021));
    assert_eq!(patch.auth_token.as_deref(), Some("fresh"));
    assert!(controller.is_ready());
    assert_eq!(h.browser.starts.load(Ordering::SeqCst), 1);

    let notes = h.drain_notifications();
    assert_eq!(notes.last().unwrap().action, ACTION_PAIRING_SUCCESS);
}

#[test]
fn accepted_token_skips_pairing() {
    let h = Harness::new();
    let mut controller = paired(&h, &[(1, 7)]);

    let patch = controller.authenticate().unwrap();
    assert!(patch.is_empty());
    assert!(h.http.requests_to(Method::Post, &format!("{BASE}/api/v1/new")).is_empty());
}

#[test]
fn disconnect_hands_control_back() {
    let h = Harness::new();
    let mut controller = paired(&h, &[(1, 7)]);

    controller.disconnect().unwrap();
    assert_eq!(
        h.http.last_body(Method::Put, &api("tok", "/effects")),
        json!({"select": "Solid"})
    );
    assert!(!controller.is_ready());
}

fn one_device(h: &Harness) {
    h.browser.services.lock().unwrap().push(DiscoveredService {
        hostname: "Lines 9F._nanoleafapi._tcp.local.".into(),
        address: "10.0.0.9".into(),
        port: 16021,
    });
    h.http.respond(
        Method::Post,
        "http://10.0.0.9:16021/api/v1/new",
        200,
        json!({"auth_token": "fresh"}),
    );
}

#[test]
fn responder_start_is_retried_with_backoff() {
    let h = Harness::new();
    one_device(&h);
    h.browser.start_failures.store(2, Ordering::SeqCst);

    let mut controller = NanoleafController::new(&h.ctx);
    controller
        .initialize(&LightConfig::new("nanoleaf", "", 0))
        .unwrap();

    let patch = controller.authenticate().unwrap();

    assert_eq!(h.browser.starts.load(Ordering::SeqCst), 3);
    assert_eq!(h.clock.elapsed(), Duration::from_secs(4));
    assert_eq!(patch.auth_token.as_deref(), Some("fresh"));
}

#[test]
fn responder_that_never_starts_skips_discovery() {
    let h = Harness::new();
    one_device(&h);
    h.browser.start_failures.store(u32::MAX, Ordering::SeqCst);

    let mut controller = NanoleafController::new(&h.ctx);
    controller
        .initialize(&LightConfig::new("nanoleaf", "", 0))
        .unwrap();

    assert!(matches!(controller.authenticate(), Err(Error::DiscoveryFailed(_))));
    assert_eq!(h.browser.starts.load(Ordering::SeqCst), 3);
    assert_eq!(h.browser.queries.load(Ordering::SeqCst), 0);
    assert!(h.http.requests().is_empty());
}

#[test]
fn rejected_token_falls_back_to_pairing() {
    let h = Harness::new();
    h.http.respond(Method::Get, &api("stale", "/"), 401, json!(null));
    h.http.respond(
        Method::Post,
        &format!("{BASE}/api/v1/new"),
        200,
        json!({"auth_token": "fresh"}),
    );

    let mut config = LightConfig::new("nanoleaf", HOST, 16021);
    config.auth_token = "stale".into();
    let mut controller = NanoleafController::new(&h.ctx);
    controller.initialize(&config).unwrap();

    let patch = controller.authenticate().unwrap();

    assert_eq!(patch.auth_token.as_deref(), Some("fresh"));
    assert_eq!(patch.host, None);
    assert_eq!(h.http.requests_to(Method::Post, &format!("{BASE}/api/v1/new")).len(), 1);
    assert_eq!(controller.updated_config().auth_token, "fresh");
    assert!(controller.is_ready());
}

#[test]
fn display_reconnects_when_device_was_offline_at_init() {
    let h = Harness::new();
    let mut config = LightConfig::new("nanoleaf", HOST, 16021);
    config.auth_token = "tok".into();
    let mut controller = NanoleafController::new(&h.ctx);
    // Nothing routed yet, so the info request gets a 404.
    controller.initialize(&config).unwrap();
    assert!(controller.is_ready());
    assert!(!controller.state().connected);

    h.http.respond(Method::Get, &api("tok", "/"), 200, json!({"name": "Canvas"}));
    h.http
        .respond(Method::Get, &api("tok", "/panelLayout/layout"), 200, layout(&[(4, 2)]));
    h.http.respond(Method::Put, &api("tok", "/effects"), 204, json!(null));

    controller
        .display_palette(&ColorPalette::new([RgbColor::RED]))
        .unwrap();

    assert!(controller.state().connected);
    assert_eq!(controller.device_name(), "Canvas");
    let urls: Vec<String> = h.http.requests().into_iter().map(|r| r.url).collect();
    let info = urls.iter().rposition(|u| *u == api("tok", "/")).unwrap();
    let put = urls.iter().position(|u| *u == api("tok", "/effects")).unwrap();
    assert!(info < put);
    assert_eq!(h.http.requests_to(Method::Put, &api("tok", "/effects")).len(), 1);
}

#[test]
fn display_still_sends_when_reconnect_fails() {
    let h = Harness::new();
    let mut config = LightConfig::new("nanoleaf", HOST, 16021);
    config.auth_token = "tok".into();
    let mut controller = NanoleafController::new(&h.ctx);
    controller.initialize(&config).unwrap();
    h.http.respond(Method::Put, &api("tok", "/effects"), 204, json!(null));

    controller
        .display_palette(&ColorPalette::new([RgbColor::BLUE]))
        .unwrap();

    assert!(!controller.state().connected);
    // One info request at init and one more before the command.
    assert_eq!(h.http.requests_to(Method::Get, &api("tok", "/")).len(), 2);
    let body = h.http.last_body(Method::Put, &api("tok", "/effects"));
    assert_eq!(body["write"]["animType"], "solid");
}
