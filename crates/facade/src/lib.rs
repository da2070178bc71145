//! `extern "C"` embedding ABI: one opaque [`VdbRuntime`] handle, UTF-8 JSON
//! payloads in and out, caller-frees-strings ownership.
//!
//! Follows the common pattern of wrapping an owned Rust object behind a raw
//! pointer for a foreign caller and freeing it through a matching `_free`
//! function, generalised here to one runtime handle fronting every service
//! (space, vector, search, snapshot, token).

pub mod dto;

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;

use serde::Serialize;
use vdb_catalog::Catalog;
use vdb_core::{Config, Error, Result};

use dto::*;

/// Opaque runtime handle: an open catalog plus its resolved configuration.
/// Never exposed to the foreign caller except as a raw pointer.
pub struct VdbRuntime {
    catalog: Catalog,
    config: Config,
}

// =============================================================================
// JSON envelope helpers
// =============================================================================

fn ok_json<T: Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(s) => string_to_c(s),
        Err(e) => err_json(&Error::Internal(e.to_string())),
    }
}

fn err_json(e: &Error) -> *mut c_char {
    let envelope = ErrorEnvelope::from_error(e);
    match serde_json::to_string(&envelope) {
        Ok(s) => string_to_c(s),
        Err(_) => string_to_c("{\"error\":{\"code\":1099,\"message\":\"unknown error\"}}".to_string()),
    }
}

fn string_to_c(s: String) -> *mut c_char {
    CString::new(s)
        .unwrap_or_else(|_| CString::new("{\"error\":{\"code\":1099,\"message\":\"response contained a NUL byte\"}}").unwrap())
        .into_raw()
}

fn result_to_c<T: Serialize>(result: Result<T>) -> *mut c_char {
    match result {
        Ok(v) => ok_json(&v),
        Err(e) => err_json(&e),
    }
}

/// Run `f`, catching a panic at the FFI boundary and converting it to the
/// `1099 UNKNOWN_ERROR` envelope rather than unwinding across foreign code.
fn guarded<T: Serialize>(f: impl FnOnce() -> Result<T>) -> *mut c_char {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result_to_c(result),
        Err(_) => err_json(&Error::Internal("panic across the FFI boundary".to_string())),
    }
}

unsafe fn str_arg<'a>(ptr: *const c_char) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(Error::BadRequest("unexpected null string argument".to_string()));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|e| Error::BadRequest(format!("argument is not valid UTF-8: {e}")))
}

unsafe fn runtime<'a>(handle: *mut VdbRuntime) -> Result<&'a VdbRuntime> {
    handle
        .as_ref()
        .ok_or_else(|| Error::BadRequest("null VdbRuntime handle".to_string()))
}

fn version_unique_id_opt(v: u64) -> Option<vdb_core::UniqueId> {
    if v == 0 {
        None
    } else {
        Some(v as i64)
    }
}

// =============================================================================
// Runtime lifecycle
// =============================================================================

/// Open a runtime. `config_json` may be null/empty to use pure
/// environment-derived defaults, or `{"data_path":..,"db_name":..}` to
/// override specific fields. Returns null on failure (no JSON error channel
/// exists yet without a handle).
#[no_mangle]
pub unsafe extern "C" fn vdb_runtime_open(config_json: *const c_char) -> *mut VdbRuntime {
    let result = catch_unwind(AssertUnwindSafe(|| -> Result<VdbRuntime> {
        let mut config = Config::from_env();
        if !config_json.is_null() {
            let raw = str_arg(config_json)?;
            if !raw.trim().is_empty() {
                let overrides: OpenRequest = serde_json::from_str(raw)?;
                if let Some(p) = overrides.data_path {
                    config.data_path = PathBuf::from(p);
                }
                if let Some(n) = overrides.db_name {
                    config.db_name = n;
                }
            }
        }
        vdb_core::init_logging(&config);
        let catalog = Catalog::open(&config)?;
        Ok(VdbRuntime { catalog, config })
    }));
    match result {
        Ok(Ok(rt)) => Box::into_raw(Box::new(rt)),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "vdb_runtime_open failed");
            std::ptr::null_mut()
        }
        Err(_) => std::ptr::null_mut(),
    }
}

/// Release a runtime opened by [`vdb_runtime_open`]. A null handle is a
/// no-op.
#[no_mangle]
pub unsafe extern "C" fn vdb_runtime_close(handle: *mut VdbRuntime) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

// =============================================================================
// Space
// =============================================================================

#[no_mangle]
pub unsafe extern "C" fn vdb_space_create(handle: *mut VdbRuntime, request_json: *const c_char) -> *mut c_char {
    guarded(|| {
        let rt = runtime(handle)?;
        let raw = str_arg(request_json)?;
        let req: SpaceCreateRequest = serde_json::from_str(raw)?;
        let index_specs = req.index_specs()?;
        let space = rt.catalog.create_space(&req.name, req.description.as_deref(), &index_specs)?;
        Ok(SpaceResponse::from(space))
    })
}

#[no_mangle]
pub unsafe extern "C" fn vdb_space_get(handle: *mut VdbRuntime, name: *const c_char) -> *mut c_char {
    guarded(|| {
        let rt = runtime(handle)?;
        let name = str_arg(name)?;
        let space = rt.catalog.get_space(name)?;
        Ok(SpaceResponse::from(space))
    })
}

#[no_mangle]
pub unsafe extern "C" fn vdb_space_delete(handle: *mut VdbRuntime, name: *const c_char) -> *mut c_char {
    guarded(|| {
        let rt = runtime(handle)?;
        let name = str_arg(name)?;
        rt.catalog.delete_space(name)?;
        Ok(serde_json::json!({ "deleted": name }))
    })
}

// =============================================================================
// Vector
// =============================================================================

#[no_mangle]
pub unsafe extern "C" fn vdb_vector_upsert(
    handle: *mut VdbRuntime,
    space: *const c_char,
    version_unique_id: u64,
    request_json: *const c_char,
) -> *mut c_char {
    guarded(|| {
        let rt = runtime(handle)?;
        let space = str_arg(space)?;
        let raw = str_arg(request_json)?;
        let req: VectorUpsertRequest = serde_json::from_str(raw)?;
        let payload = req.payload()?;
        let unique_id = rt.catalog.upsert_vector(
            space,
            version_unique_id_opt(version_unique_id),
            req.index.as_deref(),
            req.unique_id,
            payload,
            &req.metadata_pairs(),
        )?;
        Ok(VectorUpsertResponse { unique_id })
    })
}

// =============================================================================
// Search
// =============================================================================

#[no_mangle]
pub unsafe extern "C" fn vdb_search(
    handle: *mut VdbRuntime,
    space: *const c_char,
    version_unique_id: u64,
    request_json: *const c_char,
) -> *mut c_char {
    guarded(|| {
        let rt = runtime(handle)?;
        let space = str_arg(space)?;
        let raw = str_arg(request_json)?;
        let req: vdb_retrieval::SearchRequest = serde_json::from_str(raw)?;
        let hits = vdb_retrieval::search(&rt.catalog, space, version_unique_id_opt(version_unique_id), &req)?;
        Ok(hits)
    })
}

// =============================================================================
// Snapshot
// =============================================================================

#[no_mangle]
pub unsafe extern "C" fn vdb_snapshot_create(handle: *mut VdbRuntime, request_json: *const c_char) -> *mut c_char {
    guarded(|| {
        let rt = runtime(handle)?;
        let raw = str_arg(request_json)?;
        let req: SnapshotCreateRequest = serde_json::from_str(raw)?;
        let selection: Vec<(String, Option<vdb_core::UniqueId>)> =
            req.selection.into_iter().map(|e| (e.space, e.version_unique_id)).collect();
        vdb_snapshot::create(&rt.catalog, &selection, std::path::Path::new(&req.file), std::path::Path::new(&req.staging_dir))?;
        Ok(SnapshotCreateResponse { file: req.file })
    })
}

#[no_mangle]
pub unsafe extern "C" fn vdb_snapshot_restore(
    handle: *mut VdbRuntime,
    zip_path: *const c_char,
    target_dir: *const c_char,
) -> *mut c_char {
    guarded(|| {
        let rt = runtime(handle)?;
        let zip_path = str_arg(zip_path)?;
        let target_dir = str_arg(target_dir)?;
        vdb_snapshot::restore(&rt.catalog, std::path::Path::new(zip_path), std::path::Path::new(target_dir))?;
        Ok(serde_json::json!({ "restored": true }))
    })
}

// =============================================================================
// Token
// =============================================================================

#[no_mangle]
pub unsafe extern "C" fn vdb_token_new(handle: *mut VdbRuntime, request_json: *const c_char) -> *mut c_char {
    guarded(|| {
        let rt = runtime(handle)?;
        let raw = str_arg(request_json)?;
        let req: TokenNewRequest = serde_json::from_str(raw)?;
        let space_id = match &req.space {
            Some(name) => Some(rt.catalog.resolve_space_id(name)?),
            None => None,
        };
        let perms: HashMap<String, i32> = req.perms;
        let jwt = vdb_security::new_token(&rt.catalog, &rt.config, space_id, perms, req.expire_days)?;
        Ok(TokenNewResponse { token: jwt })
    })
}

// =============================================================================
// String ownership
// =============================================================================

/// Free a string returned by any `vdb_*` function above. A null pointer is
/// a no-op.
#[no_mangle]
pub unsafe extern "C" fn vdb_string_free(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    unsafe fn c_str_to_string(ptr: *mut c_char) -> String {
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        vdb_string_free(ptr);
        s
    }

    fn open_test_runtime() -> *mut VdbRuntime {
        let config_json = CString::new("{}").unwrap();
        unsafe { vdb_runtime_open(config_json.as_ptr()) }
    }

    #[test]
    fn open_close_round_trips() {
        let handle = open_test_runtime();
        assert!(!handle.is_null());
        unsafe { vdb_runtime_close(handle) };
    }

    #[test]
    fn space_create_then_get_round_trips() {
        let handle = open_test_runtime();
        unsafe {
            let req = CString::new(r#"{"name":"S","description":"demo"}"#).unwrap();
            let resp = c_str_to_string(vdb_space_create(handle, req.as_ptr()));
            assert!(resp.contains("\"name\":\"S\""));

            let name = CString::new("S").unwrap();
            let resp = c_str_to_string(vdb_space_get(handle, name.as_ptr()));
            assert!(resp.contains("\"description\":\"demo\""));
            vdb_runtime_close(handle);
        }
    }

    #[test]
    fn space_get_missing_returns_error_envelope() {
        let handle = open_test_runtime();
        unsafe {
            let name = CString::new("missing").unwrap();
            let resp = c_str_to_string(vdb_space_get(handle, name.as_ptr()));
            assert!(resp.contains("\"error\""));
            vdb_runtime_close(handle);
        }
    }

    #[test]
    fn vector_upsert_then_search_round_trips() {
        let handle = open_test_runtime();
        unsafe {
            let space_req = CString::new(r#"{"name":"S"}"#).unwrap();
            c_str_to_string(vdb_space_create(handle, space_req.as_ptr()));

            let rt = &*handle;
            rt.catalog
                .create_index(
                    "S",
                    None,
                    "primary",
                    vdb_core::ValueKind::Dense,
                    vdb_core::Metric::L2,
                    4,
                    vdb_core::HnswConfig::default(),
                    vdb_core::QuantConfig::None,
                    true,
                )
                .unwrap();

            let space = CString::new("S").unwrap();
            let upsert_req = CString::new(r#"{"unique_id":1,"vector":[1.0,0.0,0.0,0.0]}"#).unwrap();
            let resp = c_str_to_string(vdb_vector_upsert(handle, space.as_ptr(), 0, upsert_req.as_ptr()));
            assert!(resp.contains("\"unique_id\":1"));

            let search_req = CString::new(r#"{"vector":[1.0,0.0,0.0,0.0],"k":5}"#).unwrap();
            let resp = c_str_to_string(vdb_search(handle, space.as_ptr(), 0, search_req.as_ptr()));
            assert!(resp.contains("\"id\":1"));
            vdb_runtime_close(handle);
        }
    }

    #[test]
    fn token_new_then_permission_for_grants_scoped_access() {
        let handle = open_test_runtime();
        unsafe {
            let req = CString::new(r#"{"perms":{"space":3},"expire_days":30}"#).unwrap();
            let resp = c_str_to_string(vdb_token_new(handle, req.as_ptr()));
            assert!(resp.contains("\"token\""));
            vdb_runtime_close(handle);
        }
    }

    #[test]
    fn null_request_json_yields_bad_request_envelope() {
        let handle = open_test_runtime();
        unsafe {
            let resp = c_str_to_string(vdb_space_create(handle, std::ptr::null()));
            assert!(resp.contains("\"code\":1001"));
            vdb_runtime_close(handle);
        }
    }

    #[test]
    fn space_create_with_dense_and_named_indexes_builds_default_version_and_indexes() {
        let handle = open_test_runtime();
        unsafe {
            let req = CString::new(
                r#"{"name":"S","dimension":4,"metric":"l2",
                    "dense":{"metric":"cosine"},
                    "indexes":{"alt":{"dimension":8}}}"#,
            )
            .unwrap();
            c_str_to_string(vdb_space_create(handle, req.as_ptr()));

            let rt = &*handle;
            let version = rt.catalog.resolve_version("S", None).unwrap();
            let default_index = rt.catalog.resolve_index(&version, None).unwrap();
            assert_eq!(default_index.name, "dense");
            assert_eq!(default_index.metric, vdb_core::Metric::Cosine);
            assert_eq!(default_index.dimension, 4);

            let alt = rt.catalog.resolve_index(&version, Some("alt")).unwrap();
            assert_eq!(alt.dimension, 8);
            assert_eq!(alt.metric, vdb_core::Metric::L2);
            vdb_runtime_close(handle);
        }
    }

    #[test]
    fn vector_upsert_without_unique_id_assigns_one() {
        let handle = open_test_runtime();
        unsafe {
            let space_req = CString::new(r#"{"name":"S"}"#).unwrap();
            c_str_to_string(vdb_space_create(handle, space_req.as_ptr()));

            let rt = &*handle;
            rt.catalog
                .create_index(
                    "S", None, "primary", vdb_core::ValueKind::Dense, vdb_core::Metric::L2, 4,
                    vdb_core::HnswConfig::default(), vdb_core::QuantConfig::None, true,
                )
                .unwrap();

            let space = CString::new("S").unwrap();
            let upsert_req = CString::new(r#"{"vector":[1.0,0.0,0.0,0.0]}"#).unwrap();
            let resp = c_str_to_string(vdb_vector_upsert(handle, space.as_ptr(), 0, upsert_req.as_ptr()));
            assert!(resp.contains("\"unique_id\":1"));
            vdb_runtime_close(handle);
        }
    }
}
