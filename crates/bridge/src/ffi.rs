// C ABI entry points
// Bridges are addressed by integer handles; every call returns 0 on success
// and -1 after logging the failure.

use crate::bridge::NowplayBridge;
use crate::logging::init_logging;
use crate::platform::MessageSink;
use nowplay_core::{PlayerError, Result};
use nowplay_engine::EngineConfig;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::sync::Arc;

/// Receives one outbound JSON message. The string is only valid for the
/// duration of the call. Returns 0 when the message was taken.
pub type NowplayCallback = extern "C" fn(user_data: *mut c_void, json: *const c_char) -> i32;

static BRIDGE_REGISTRY: Lazy<Mutex<HashMap<i64, Arc<NowplayBridge>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_BRIDGE_ID: Lazy<Mutex<i64>> = Lazy::new(|| Mutex::new(1));

struct CallbackSink {
    callback: NowplayCallback,
    user_data: *mut c_void,
}

// The host guarantees `user_data` may be used from any thread until release
unsafe impl Send for CallbackSink {}
unsafe impl Sync for CallbackSink {}

impl MessageSink for CallbackSink {
    fn deliver(&self, json: &str) -> i32 {
        match CString::new(json) {
            Ok(c_json) => (self.callback)(self.user_data, c_json.as_ptr()),
            Err(e) => {
                log::error!("Outbound message contains NUL: {}", e);
                -1
            }
        }
    }
}

pub(crate) fn register_bridge(bridge: NowplayBridge) -> i64 {
    let mut next = NEXT_BRIDGE_ID.lock();
    let id = *next;
    *next += 1;
    drop(next);

    BRIDGE_REGISTRY.lock().insert(id, Arc::new(bridge));
    log::info!("Bridge {} created", id);
    id
}

/// Runs `f` outside the registry lock so host callbacks may re-enter
pub(crate) fn with_bridge<R>(id: i64, f: impl FnOnce(&NowplayBridge) -> Result<R>) -> Result<R> {
    let bridge = BRIDGE_REGISTRY
        .lock()
        .get(&id)
        .cloned()
        .ok_or_else(|| PlayerError::InvalidState(format!("invalid bridge id {}", id)))?;
    f(&bridge)
}

pub(crate) fn release_bridge(id: i64) -> Result<()> {
    // Shut down outside the registry lock; the worker may still be posting
    let bridge = BRIDGE_REGISTRY.lock().remove(&id);
    match bridge.map(Arc::try_unwrap) {
        Some(Ok(mut bridge)) => {
            bridge.release();
            log::info!("Bridge {} released", id);
            Ok(())
        }
        // A call in flight holds the last reference; its drop shuts the worker down
        Some(Err(_)) => {
            log::info!("Bridge {} released while in use", id);
            Ok(())
        }
        None => Err(PlayerError::InvalidState(format!("invalid bridge id {}", id))),
    }
}

pub(crate) fn to_code(result: Result<()>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(err) => {
            log::error!("FFI error: {}", err);
            -1
        }
    }
}

fn read_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(PlayerError::InvalidState(format!("{} is null", what)));
    }
    let c_str = unsafe { CStr::from_ptr(ptr) };
    c_str
        .to_str()
        .map_err(|e| PlayerError::InvalidState(format!("{} is not UTF-8: {}", what, e)))
}

/// Create a bridge posting host messages to `host_cb` and now-playing and
/// audio-session requests to `platform_cb`. Returns the handle, or -1.
#[no_mangle]
pub extern "C" fn nowplay_bridge_create(
    host_cb: Option<NowplayCallback>,
    platform_cb: Option<NowplayCallback>,
    user_data: *mut c_void,
) -> i64 {
    init_logging();
    let (Some(host_cb), Some(platform_cb)) = (host_cb, platform_cb) else {
        log::error!("nowplay_bridge_create needs both callbacks");
        return -1;
    };

    let host = Arc::new(CallbackSink {
        callback: host_cb,
        user_data,
    });
    let platform = Arc::new(CallbackSink {
        callback: platform_cb,
        user_data,
    });
    match NowplayBridge::new(EngineConfig::default(), host, platform) {
        Ok(bridge) => register_bridge(bridge),
        Err(err) => {
            log::error!("Failed to create bridge: {}", err);
            -1
        }
    }
}

/// Submit one `{"token","action","args"}` command.
#[no_mangle]
pub extern "C" fn nowplay_bridge_execute(bridge_id: i64, json: *const c_char) -> i32 {
    to_code(read_str(json, "command").and_then(|json| with_bridge(bridge_id, |b| b.execute(json))))
}

/// Forward a device event (button, interruption, connectivity).
#[no_mangle]
pub extern "C" fn nowplay_bridge_device_event(bridge_id: i64, json: *const c_char) -> i32 {
    to_code(
        read_str(json, "device event")
            .and_then(|json| with_bridge(bridge_id, |b| b.device_event(json))),
    )
}

/// Current status JSON, or null. Free with `nowplay_string_free`.
#[no_mangle]
pub extern "C" fn nowplay_bridge_status(bridge_id: i64) -> *mut c_char {
    let status = with_bridge(bridge_id, |b| b.status_json()).and_then(|json| {
        CString::new(json).map_err(|e| PlayerError::InvalidState(e.to_string()))
    });
    match status {
        Ok(json) => json.into_raw(),
        Err(err) => {
            log::error!("Failed to get status: {}", err);
            std::ptr::null_mut()
        }
    }
}

#[no_mangle]
pub extern "C" fn nowplay_bridge_release(bridge_id: i64) -> i32 {
    to_code(release_bridge(bridge_id))
}

/// Free a string returned by this library.
#[no_mangle]
pub extern "C" fn nowplay_string_free(s: *mut c_char) {
    if !s.is_null() {
        unsafe {
            drop(CString::from_raw(s));
        }
    }
}
