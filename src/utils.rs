//! 控制台日志、panic 钩子与计时。
//!
//! 非 wasm32 目标上日志为空操作，计时改用 `std::time::Instant`，
//! 以便核心逻辑直接用 `cargo test` 测试。

use std::time::Duration;

#[cfg(target_arch = "wasm32")]
pub fn log(message: &str) {
    web_sys::console::log_1(&message.into());
}

#[cfg(not(target_arch = "wasm32"))]
pub fn log(_message: &str) {}

#[cfg(target_arch = "wasm32")]
pub fn warn(message: &str) {
    web_sys::console::warn_1(&message.into());
}

#[cfg(not(target_arch = "wasm32"))]
pub fn warn(_message: &str) {}

#[cfg(feature = "console_error_panic_hook")]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
pub fn set_panic_hook() {}

/// Elapsed-time measurement that works inside the browser.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    #[cfg(target_arch = "wasm32")]
    started_ms: f64,
    #[cfg(not(target_arch = "wasm32"))]
    started: std::time::Instant,
}

impl Stopwatch {
    #[cfg(target_arch = "wasm32")]
    pub fn start() -> Self {
        Self {
            started_ms: web_sys::js_sys::Date::now(),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn start() -> Self {
        Self {
            started: std::time::Instant::now(),
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn elapsed(&self) -> Duration {
        let elapsed_ms = web_sys::js_sys::Date::now() - self.started_ms;
        Duration::from_millis(elapsed_ms.max(0.0) as u64)
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }
}
