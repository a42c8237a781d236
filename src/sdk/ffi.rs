//! FFI backend over the vendor camera SDK's C shim
//!
//! The vendor ships a C++ SDK; this module binds the thin C shim built
//! alongside it (`libcrsdk_shim`). Only compiled with the `vendor-sdk`
//! feature, since it needs the shim and the vendor's adapter libraries
//! installed.
//!
//! Memory discipline at this boundary:
//! - enumeration lists are reference-counted and vendor-owned; every field
//!   we need is copied into owned Rust values and the list is released
//!   before `enumerate` returns
//! - live-view payloads and property arrays are only valid until the call
//!   that produced them returns; they are copied likewise
//! - the callback context passed to `crsdk_connect` stays alive until
//!   after `crsdk_disconnect` returns, which the shim guarantees is the
//!   last point a callback can fire

use crate::sdk::backend::{
    CameraSdk, CommandId, CommandParam, ConnectionType, DeviceDescriptor, DeviceEventSink,
    PropertyKind, RawProperty, ReconnectPolicy, SdkError, SdkHandle,
};
use log::{info, warn};
use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Opaque vendor enumeration list
#[repr(C)]
struct CrsdkDeviceList {
    _private: [u8; 0],
}

/// One entry of the enumeration list. All pointers are owned by the list
/// and die with it.
#[repr(C)]
struct CrsdkDeviceEntry {
    model: *const c_char,
    connection: u32,
    id: *const u8,
    id_len: u32,
}

/// One vendor property record (matches crsdk_shim.h)
#[repr(C)]
struct CrsdkProperty {
    code: u32,
    kind: u32,
    value: u64,
}

/// Callback table registered at connect time
#[repr(C)]
struct CrsdkCallbacks {
    on_connected: unsafe extern "C" fn(user: *mut c_void),
    on_disconnected: unsafe extern "C" fn(user: *mut c_void, reason: u32),
    on_property_changed: unsafe extern "C" fn(user: *mut c_void),
    on_live_view_frame: unsafe extern "C" fn(user: *mut c_void, data: *const u8, len: usize),
    on_captured_file: unsafe extern "C" fn(user: *mut c_void, path: *const c_char),
    on_warning: unsafe extern "C" fn(user: *mut c_void, code: u32),
    on_error: unsafe extern "C" fn(user: *mut c_void, code: u32),
}

extern "C" {
    fn crsdk_init() -> u32;
    fn crsdk_release();
    fn crsdk_enumerate(out: *mut *mut CrsdkDeviceList) -> u32;
    fn crsdk_list_count(list: *const CrsdkDeviceList) -> u32;
    fn crsdk_list_entry(
        list: *const CrsdkDeviceList,
        index: u32,
        out: *mut CrsdkDeviceEntry,
    ) -> u32;
    fn crsdk_list_release(list: *mut CrsdkDeviceList);
    fn crsdk_connect(
        model: *const c_char,
        id: *const u8,
        id_len: u32,
        callbacks: *const CrsdkCallbacks,
        user: *mut c_void,
        reconnect: u32,
        out_handle: *mut i64,
    ) -> u32;
    fn crsdk_disconnect(handle: i64) -> u32;
    fn crsdk_send_command(handle: i64, command: u32, param: u32) -> u32;
    fn crsdk_get_properties(
        handle: i64,
        out: *mut *mut CrsdkProperty,
        count: *mut i32,
    ) -> u32;
    fn crsdk_release_properties(handle: i64, properties: *mut CrsdkProperty);
    fn crsdk_set_property(handle: i64, property: *const CrsdkProperty) -> u32;
}

fn check(code: u32, what: &str) -> Result<(), SdkError> {
    if code == 0 {
        Ok(())
    } else {
        Err(SdkError::new(code, format!("{} failed", what)))
    }
}

/// Context handed to the shim as the callback `user` pointer
struct SinkContext {
    sink: Arc<dyn DeviceEventSink>,
}

unsafe fn context<'a>(user: *mut c_void) -> &'a SinkContext {
    &*(user as *const SinkContext)
}

unsafe extern "C" fn cb_on_connected(user: *mut c_void) {
    context(user).sink.on_connected();
}

unsafe extern "C" fn cb_on_disconnected(user: *mut c_void, reason: u32) {
    context(user).sink.on_disconnected(reason);
}

unsafe extern "C" fn cb_on_property_changed(user: *mut c_void) {
    context(user).sink.on_property_changed();
}

unsafe extern "C" fn cb_on_live_view_frame(user: *mut c_void, data: *const u8, len: usize) {
    if data.is_null() {
        return;
    }
    // Borrow only for the duration of the callback; the sink copies.
    let payload = std::slice::from_raw_parts(data, len);
    context(user).sink.on_live_view_frame(payload);
}

unsafe extern "C" fn cb_on_captured_file(user: *mut c_void, path: *const c_char) {
    if path.is_null() {
        return;
    }
    let path = PathBuf::from(CStr::from_ptr(path).to_string_lossy().into_owned());
    context(user).sink.on_captured_file(Path::new(&path));
}

unsafe extern "C" fn cb_on_warning(user: *mut c_void, code: u32) {
    context(user).sink.on_warning(code);
}

unsafe extern "C" fn cb_on_error(user: *mut c_void, code: u32) {
    context(user).sink.on_error(code);
}

const CALLBACKS: CrsdkCallbacks = CrsdkCallbacks {
    on_connected: cb_on_connected,
    on_disconnected: cb_on_disconnected,
    on_property_changed: cb_on_property_changed,
    on_live_view_frame: cb_on_live_view_frame,
    on_captured_file: cb_on_captured_file,
    on_warning: cb_on_warning,
    on_error: cb_on_error,
};

/// Real vendor SDK backend
pub struct CrSdk {
    sdk_dir: PathBuf,
    /// Callback contexts for open handles, freed after vendor disconnect
    contexts: Mutex<HashMap<SdkHandle, *mut SinkContext>>,
}

// Raw context pointers are only ever touched under the mutex
unsafe impl Send for CrSdk {}
unsafe impl Sync for CrSdk {}

impl CrSdk {
    /// Create a backend rooted at the vendor SDK installation directory
    pub fn new(sdk_dir: PathBuf) -> Self {
        Self {
            sdk_dir,
            contexts: Mutex::new(HashMap::new()),
        }
    }

    fn kind_from_wire(kind: u32) -> PropertyKind {
        match kind {
            0 => PropertyKind::U8,
            1 => PropertyKind::U16,
            2 => PropertyKind::U32,
            _ => PropertyKind::U64,
        }
    }

    fn kind_to_wire(kind: PropertyKind) -> u32 {
        match kind {
            PropertyKind::U8 => 0,
            PropertyKind::U16 => 1,
            PropertyKind::U32 => 2,
            PropertyKind::U64 => 3,
        }
    }
}

impl CameraSdk for CrSdk {
    fn init(&self) -> Result<(), SdkError> {
        // The vendor loads its transport adapters relative to the process
        // working directory. Pin it to the SDK directory for the lifetime
        // of the process; restoring it would break later adapter loads.
        std::env::set_current_dir(&self.sdk_dir)
            .map_err(|e| SdkError::new(0x8000, format!("cannot enter SDK directory: {}", e)))?;
        info!("Vendor SDK directory: {}", self.sdk_dir.display());

        unsafe { check(crsdk_init(), "vendor init") }
    }

    fn release(&self) {
        unsafe { crsdk_release() }
    }

    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, SdkError> {
        unsafe {
            let mut list: *mut CrsdkDeviceList = std::ptr::null_mut();
            check(crsdk_enumerate(&mut list), "enumeration")?;
            if list.is_null() {
                return Ok(Vec::new());
            }

            let count = crsdk_list_count(list);
            let mut devices = Vec::with_capacity(count as usize);

            for index in 0..count {
                let mut entry = CrsdkDeviceEntry {
                    model: std::ptr::null(),
                    connection: 0,
                    id: std::ptr::null(),
                    id_len: 0,
                };
                if crsdk_list_entry(list, index, &mut entry) != 0 {
                    warn!("Skipping unreadable enumeration entry {}", index);
                    continue;
                }

                // Deep-copy every field before the list is released
                let model = if entry.model.is_null() {
                    "Unknown".to_string()
                } else {
                    CStr::from_ptr(entry.model).to_string_lossy().into_owned()
                };
                let raw_id = if entry.id.is_null() {
                    Vec::new()
                } else {
                    std::slice::from_raw_parts(entry.id, entry.id_len as usize).to_vec()
                };
                let connection = match entry.connection {
                    0 => ConnectionType::Usb,
                    1 => ConnectionType::Ethernet,
                    _ => ConnectionType::Unknown,
                };

                devices.push(DeviceDescriptor {
                    model,
                    connection,
                    raw_id,
                });
            }

            crsdk_list_release(list);
            Ok(devices)
        }
    }

    fn connect(
        &self,
        descriptor: &DeviceDescriptor,
        sink: Arc<dyn DeviceEventSink>,
        reconnect: ReconnectPolicy,
    ) -> Result<SdkHandle, SdkError> {
        let model = std::ffi::CString::new(descriptor.model.as_str())
            .map_err(|_| SdkError::new(0x8200, "model name contains NUL"))?;

        let context = Box::into_raw(Box::new(SinkContext { sink }));
        let mut handle: i64 = 0;

        let status = unsafe {
            crsdk_connect(
                model.as_ptr(),
                descriptor.raw_id.as_ptr(),
                descriptor.raw_id.len() as u32,
                &CALLBACKS,
                context as *mut c_void,
                match reconnect {
                    ReconnectPolicy::Off => 0,
                    ReconnectPolicy::On => 1,
                },
                &mut handle,
            )
        };

        if status != 0 {
            // No callbacks can have been registered on failure
            unsafe { drop(Box::from_raw(context)) };
            return Err(SdkError::new(status, "vendor connect failed"));
        }

        self.contexts.lock().unwrap().insert(handle, context);
        Ok(handle)
    }

    fn disconnect(&self, handle: SdkHandle) -> Result<(), SdkError> {
        let result = unsafe { check(crsdk_disconnect(handle), "vendor disconnect") };

        // The shim delivers no callbacks for this handle once disconnect
        // has returned, so the context can be reclaimed either way.
        if let Some(context) = self.contexts.lock().unwrap().remove(&handle) {
            unsafe { drop(Box::from_raw(context)) };
        }
        result
    }

    fn send_command(
        &self,
        handle: SdkHandle,
        command: CommandId,
        param: CommandParam,
    ) -> Result<(), SdkError> {
        unsafe {
            check(
                crsdk_send_command(handle, command as u32, param as u32),
                "send command",
            )
        }
    }

    fn get_properties(&self, handle: SdkHandle) -> Result<Vec<RawProperty>, SdkError> {
        unsafe {
            let mut array: *mut CrsdkProperty = std::ptr::null_mut();
            let mut count: i32 = 0;
            check(
                crsdk_get_properties(handle, &mut array, &mut count),
                "get properties",
            )?;
            if array.is_null() || count <= 0 {
                return Ok(Vec::new());
            }

            // Copy out before releasing the vendor array
            let properties = std::slice::from_raw_parts(array, count as usize)
                .iter()
                .map(|p| RawProperty {
                    code: p.code,
                    kind: Self::kind_from_wire(p.kind),
                    value: p.value,
                })
                .collect();

            crsdk_release_properties(handle, array);
            Ok(properties)
        }
    }

    fn set_property(&self, handle: SdkHandle, property: RawProperty) -> Result<(), SdkError> {
        let record = CrsdkProperty {
            code: property.code,
            kind: Self::kind_to_wire(property.kind),
            value: property.value,
        };
        unsafe { check(crsdk_set_property(handle, &record), "set property") }
    }
}
