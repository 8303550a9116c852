// JNI bindings for org.nowplay.NowplayBridge
// Listeners implement `int onMessage(String json)`; they are called from the
// session and engine threads, which are attached to the VM for each call.

use crate::bridge::NowplayBridge;
use crate::ffi::{register_bridge, release_bridge, to_code, with_bridge};
use crate::logging::init_logging;
use crate::platform::MessageSink;
use jni::objects::{GlobalRef, JClass, JObject, JString};
use jni::sys::{jint, jlong, jstring};
use jni::{JNIEnv, JavaVM};
use nowplay_core::{PlayerError, Result};
use nowplay_engine::EngineConfig;
use std::sync::Arc;

struct JniListener {
    vm: JavaVM,
    listener: GlobalRef,
}

impl JniListener {
    fn new(env: &JNIEnv, listener: &JObject) -> jni::errors::Result<Self> {
        Ok(Self {
            vm: env.get_java_vm()?,
            listener: env.new_global_ref(listener)?,
        })
    }

    fn call(&self, json: &str) -> jni::errors::Result<i32> {
        let mut env = self.vm.attach_current_thread()?;
        let message = env.new_string(json)?;
        let result = env
            .call_method(
                self.listener.as_obj(),
                "onMessage",
                "(Ljava/lang/String;)I",
                &[(&message).into()],
            )
            .and_then(|value| value.i());
        if env.exception_check()? {
            env.exception_describe()?;
            env.exception_clear()?;
        }
        result
    }
}

impl MessageSink for JniListener {
    fn deliver(&self, json: &str) -> i32 {
        self.call(json).unwrap_or_else(|e| {
            log::error!("Listener call failed: {}", e);
            -1
        })
    }
}

fn jstring_to_string(env: &mut JNIEnv, jstr: &JString) -> Result<String> {
    let java_str = env
        .get_string(jstr)
        .map_err(|e| PlayerError::InvalidState(e.to_string()))?;
    Ok(java_str.into())
}

fn string_to_jstring(env: &JNIEnv, s: &str) -> Result<jstring> {
    env.new_string(s)
        .map(|j| j.into_raw())
        .map_err(|e| PlayerError::InvalidState(e.to_string()))
}

#[no_mangle]
pub extern "system" fn Java_org_nowplay_NowplayBridge_nativeCreate(
    env: JNIEnv,
    _class: JClass,
    host_listener: JObject,
    platform_listener: JObject,
) -> jlong {
    init_logging();

    let listeners = JniListener::new(&env, &host_listener)
        .and_then(|host| Ok((host, JniListener::new(&env, &platform_listener)?)));
    let (host, platform) = match listeners {
        Ok(listeners) => listeners,
        Err(e) => {
            log::error!("Failed to hold listeners: {}", e);
            return -1;
        }
    };

    match NowplayBridge::new(EngineConfig::default(), Arc::new(host), Arc::new(platform)) {
        Ok(bridge) => register_bridge(bridge),
        Err(err) => {
            log::error!("Failed to create bridge: {}", err);
            -1
        }
    }
}

#[no_mangle]
pub extern "system" fn Java_org_nowplay_NowplayBridge_nativeExecute(
    mut env: JNIEnv,
    _class: JClass,
    bridge_id: jlong,
    json: JString,
) -> jint {
    let result = jstring_to_string(&mut env, &json)
        .and_then(|json| with_bridge(bridge_id, |b| b.execute(&json)));
    to_code(result) as jint
}

#[no_mangle]
pub extern "system" fn Java_org_nowplay_NowplayBridge_nativeDeviceEvent(
    mut env: JNIEnv,
    _class: JClass,
    bridge_id: jlong,
    json: JString,
) -> jint {
    let result = jstring_to_string(&mut env, &json)
        .and_then(|json| with_bridge(bridge_id, |b| b.device_event(&json)));
    to_code(result) as jint
}

#[no_mangle]
pub extern "system" fn Java_org_nowplay_NowplayBridge_nativeStatus(
    env: JNIEnv,
    _class: JClass,
    bridge_id: jlong,
) -> jstring {
    match with_bridge(bridge_id, |b| b.status_json()).and_then(|json| string_to_jstring(&env, &json)) {
        Ok(status) => status,
        Err(err) => {
            log::error!("Failed to get status: {}", err);
            std::ptr::null_mut()
        }
    }
}

#[no_mangle]
pub extern "system" fn Java_org_nowplay_NowplayBridge_nativeRelease(
    _env: JNIEnv,
    _class: JClass,
    bridge_id: jlong,
) -> jint {
    to_code(release_bridge(bridge_id)) as jint
}
