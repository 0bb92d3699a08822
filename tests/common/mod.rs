#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use palette_light::api::dto::DriverSettings;
use palette_light::interface::controller::{ControllerContext, UserNotification};
use palette_light::resource::driver::clock::Clock;
use palette_light::resource::driver::http::{HttpResponse, HttpTransport, Method};
use palette_light::resource::driver::mdns::{DiscoveredService, ServiceBrowser};
use palette_light::resource::driver::strip::{PixelStrip, StripOpener, StripSpec};
use palette_light::{Error, Result};
use serde_json::Value;
use smart_leds::{SmartLedsWrite, RGB8};

#[derive(Clone, Debug)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

/// Answers scripted routes and records every request. Unknown routes get 404.
#[derive(Default)]
pub struct FakeHttp {
    routes: Mutex<HashMap<(&'static str, String), HttpResponse>>,
    requests: Mutex<Vec<Request>>,
}

impl FakeHttp {
    pub fn respond(&self, method: Method, url: &str, status: u16, body: Value) {
        let body = if body.is_null() { String::new() } else { body.to_string() };
        self.routes
            .lock()
            .unwrap()
            .insert((method.as_str(), url.to_string()), HttpResponse { status, body });
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: Method, url: &str) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.url == url)
            .collect()
    }

    pub fn last_body(&self, method: Method, url: &str) -> Value {
        self.requests_to(method, url)
            .pop()
            .and_then(|r| r.body)
            .unwrap_or(Value::Null)
    }
}

impl HttpTransport for FakeHttp {
    fn request(&self, method: Method, url: &str, body: Option<&Value>) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(Request {
            method,
            url: url.to_string(),
            body: body.cloned(),
        });
        Ok(self
            .routes
            .lock()
            .unwrap()
            .get(&(method.as_str(), url.to_string()))
            .cloned()
            .unwrap_or(HttpResponse {
                status: 404,
                body: String::new(),
            }))
    }
}

#[derive(Default)]
pub struct FakeBrowser {
    pub services: Mutex<Vec<DiscoveredService>>,
    pub starts: AtomicU32,
    pub queries: AtomicU32,
    /// How many upcoming `start` calls fail. `u32::MAX` fails forever.
    pub start_failures: AtomicU32,
}

impl ServiceBrowser for FakeBrowser {
    fn start(&self, _instance_name: &str) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let failures = self.start_failures.load(Ordering::SeqCst);
        if failures > 0 {
            if failures != u32::MAX {
                self.start_failures.store(failures - 1, Ordering::SeqCst);
            }
            return Err(Error::DiscoveryFailed("responder busy".to_string()));
        }
        Ok(())
    }

    fn query(&self, _service_type: &str, _window: Duration) -> Result<Vec<DiscoveredService>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.services.lock().unwrap().clone())
    }
}

/// Time only moves on `sleep` and `advance`.
pub struct FakeClock {
    now: Mutex<Instant>,
    start: Instant,
}

impl FakeClock {
    pub fn new() -> Self {
        let start = Instant::now();
        Self {
            now: Mutex::new(start),
            start,
        }
    }

    pub fn advance(&self, duration: Duration) {
        *self.now.lock().unwrap() += duration;
    }

    pub fn elapsed(&self) -> Duration {
        *self.now.lock().unwrap() - self.start
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

pub type Frames = Arc<Mutex<Vec<Vec<RGB8>>>>;

pub struct RecordingStrip {
    frames: Frames,
}

impl SmartLedsWrite for RecordingStrip {
    type Error = Infallible;
    type Color = RGB8;

    fn write<T, I>(&mut self, iterator: T) -> std::result::Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        let frame = iterator.into_iter().map(Into::into).collect();
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }
}

pub struct FakeOpener {
    pub available: AtomicBool,
    pub frames: Frames,
    pub opened: Mutex<Vec<StripSpec>>,
}

impl FakeOpener {
    pub fn new(available: bool) -> Self {
        Self {
            available: AtomicBool::new(available),
            frames: Frames::default(),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn frames(&self) -> Vec<Vec<RGB8>> {
        self.frames.lock().unwrap().clone()
    }

    pub fn last_frame(&self) -> Vec<RGB8> {
        self.frames().pop().unwrap_or_default()
    }
}

impl StripOpener for FakeOpener {
    fn open(&self, spec: &StripSpec) -> Result<Box<dyn PixelStrip>> {
        self.opened.lock().unwrap().push(spec.clone());
        if !self.available.load(Ordering::SeqCst) {
            return Err(Error::Hardware("no strip attached".to_string()));
        }
        Ok(Box::new(RecordingStrip {
            frames: self.frames.clone(),
        }))
    }
}

/// Fakes for every seam plus the receiving end of the notification channel.
pub struct Harness {
    pub http: Arc<FakeHttp>,
    pub browser: Arc<FakeBrowser>,
    pub clock: Arc<FakeClock>,
    pub strips: Arc<FakeOpener>,
    pub notifications: flume::Receiver<UserNotification>,
    pub ctx: ControllerContext,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_strip(true)
    }

    pub fn with_strip(available: bool) -> Self {
        let http = Arc::new(FakeHttp::default());
        let browser = Arc::new(FakeBrowser::default());
        let clock = Arc::new(FakeClock::new());
        let strips = Arc::new(FakeOpener::new(available));
        let (tx, rx) = flume::unbounded();

        let ctx = ControllerContext {
            http: http.clone(),
            browser: browser.clone(),
            clock: clock.clone(),
            strips: strips.clone(),
            notifier: Arc::new(tx),
            settings: DriverSettings::default_for_device(),
        };

        Self {
            http,
            browser,
            clock,
            strips,
            notifications: rx,
            ctx,
        }
    }

    pub fn drain_notifications(&self) -> Vec<UserNotification> {
        self.notifications.try_iter().collect()
    }
}

pub fn rgb(color: palette_light::RgbColor) -> RGB8 {
    RGB8::new(color.r, color.g, color.b)
}
