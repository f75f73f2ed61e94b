//! C-compatible FFI API for cross-language bindings.
//!
//! # ABI Contract
//!
//! All exported functions use `extern "C"` calling convention and `#[no_mangle]`
//! to ensure stable symbol names. Documents and configuration cross the
//! boundary as UTF-8 JSON, in the same shape the CLI reads.
//!
//! ## Memory management
//! - Strings and buffers returned by `ebook_*` functions are allocated on the
//!   Rust heap.
//! - Callers **must** free them with `ebook_free_string` / `ebook_free_buffer`.
//! - Passing a null pointer to a free function is a no-op.
//!
//! ## Error handling
//! - Functions that can fail return a `c_int`:
//!   `0` success, `1` null pointer, `2` invalid UTF-8, `3` invalid document
//!   or configuration, `4` generation failed, `5` output contained a NUL byte.
//! - Error details can be retrieved via `ebook_last_error`.
//!
//! ## Thread safety
//! - `ebook_last_error` uses a thread-local, so it is safe to call from
//!   multiple threads.
//!
//! ## Usage from Go (cgo)
//! ```go
//! // #cgo LDFLAGS: -lebook_forge
//! // #include <stdint.h>
//! // extern int ebook_generate(const uint8_t* json, uint32_t json_len,
//! //                           const char* config_json, char** out_report_json);
//! // extern const char* ebook_last_error();
//! // extern void ebook_free_string(char* s);
//! import "C"
//! ```

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;
use std::slice;

use crate::assets::{LocalAssets, RetryingFetcher};
use crate::config::LayoutConstants;
use crate::error::Error;
use crate::fonts::FontRegistry;
use crate::model::EbookDocument;
use crate::package::Format;
use crate::pipeline::{chapter_page_index, generate_all, render, RenderContext};

const ERR_NULL: c_int = 1;
const ERR_UTF8: c_int = 2;
const ERR_INPUT: c_int = 3;
const ERR_GENERATION: c_int = 4;
const ERR_NUL_BYTE: c_int = 5;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

// ---------------------------------------------------------------------------
// Argument decoding
// ---------------------------------------------------------------------------

/// Decode the document JSON at `json_ptr`, setting the last error on failure.
unsafe fn read_document(json_ptr: *const u8, json_len: u32) -> Result<EbookDocument, c_int> {
    let bytes = slice::from_raw_parts(json_ptr, json_len as usize);
    let json = std::str::from_utf8(bytes).map_err(|e| {
        set_last_error(&format!("Invalid UTF-8: {e}"));
        ERR_UTF8
    })?;
    EbookDocument::from_json(json).map_err(|e| {
        set_last_error(&e.to_string());
        ERR_INPUT
    })
}

/// Decode an optional NUL-terminated string argument.
unsafe fn read_optional_str<'a>(s: *const c_char) -> Result<Option<&'a str>, c_int> {
    if s.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(s).to_str().map(Some).map_err(|e| {
        set_last_error(&format!("Invalid UTF-8: {e}"));
        ERR_UTF8
    })
}

unsafe fn read_constants(config_json: *const c_char) -> Result<LayoutConstants, c_int> {
    match read_optional_str(config_json)? {
        None => Ok(LayoutConstants::default()),
        Some(json) => LayoutConstants::from_json(json).map_err(|e| {
            set_last_error(&e.to_string());
            ERR_INPUT
        }),
    }
}

unsafe fn read_format(format: *const c_char) -> Result<Format, c_int> {
    let name = read_optional_str(format)?.ok_or_else(|| {
        set_last_error("Null pointer argument");
        ERR_NULL
    })?;
    name.parse().map_err(|e: Error| {
        set_last_error(&e.to_string());
        ERR_INPUT
    })
}

unsafe fn write_string(out: *mut *mut c_char, s: String) -> c_int {
    match CString::new(s) {
        Ok(cs) => {
            *out = cs.into_raw();
            0
        }
        Err(_) => {
            *out = ptr::null_mut();
            set_last_error("Output contained a null byte");
            ERR_NUL_BYTE
        }
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Render every format into the configured `output_dir`.
///
/// # Parameters
/// - `json_ptr`, `json_len`: the `EbookDocument` as UTF-8 JSON
/// - `config_json`: `user_config.json` contents, or `NULL` for defaults
/// - `out_report_json`: receives the generation report as JSON
///
/// # Returns
/// `0` when at least one format was written; the report lists the failures.
/// `4` when every format failed.
///
/// # Safety
/// - `json_ptr` must point to `json_len` valid bytes.
/// - `config_json`, if non-null, must be a valid NUL-terminated string.
/// - The caller must free `*out_report_json` with `ebook_free_string`.
#[no_mangle]
pub unsafe extern "C" fn ebook_generate(
    json_ptr: *const u8,
    json_len: u32,
    config_json: *const c_char,
    out_report_json: *mut *mut c_char,
) -> c_int {
    if json_ptr.is_null() || out_report_json.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }

    let doc = match read_document(json_ptr, json_len) {
        Ok(doc) => doc,
        Err(code) => return code,
    };
    let constants = match read_constants(config_json) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let fonts = FontRegistry::discover(&constants);
    let assets = RetryingFetcher::new(LocalAssets::new());
    let ctx = RenderContext {
        doc: &doc,
        constants: &constants,
        fonts: &fonts,
        assets: &assets,
    };

    match generate_all(&Format::ALL, ctx, &constants.output_dir) {
        Ok(report) => write_string(out_report_json, report.to_json()),
        Err(e) => {
            set_last_error(&e.to_string());
            ERR_GENERATION
        }
    }
}

/// Render one format to an in-memory buffer.
///
/// # Parameters
/// - `json_ptr`, `json_len`: the `EbookDocument` as UTF-8 JSON
/// - `format`: `"pdf"`, `"docx"`, `"pptx"` or `"hwpx"`
/// - `config_json`: `user_config.json` contents, or `NULL` for defaults
/// - `out_buf`, `out_len`: the file bytes
///
/// # Returns
/// `0` on success.
///
/// # Safety
/// - `json_ptr` must point to `json_len` valid bytes.
/// - `format` must be a valid NUL-terminated string; `config_json` may be null.
/// - The caller must free `*out_buf` with `ebook_free_buffer`.
#[no_mangle]
pub unsafe extern "C" fn ebook_render(
    json_ptr: *const u8,
    json_len: u32,
    format: *const c_char,
    config_json: *const c_char,
    out_buf: *mut *mut u8,
    out_len: *mut u32,
) -> c_int {
    if json_ptr.is_null() || format.is_null() || out_buf.is_null() || out_len.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }

    let doc = match read_document(json_ptr, json_len) {
        Ok(doc) => doc,
        Err(code) => return code,
    };
    let format = match read_format(format) {
        Ok(f) => f,
        Err(code) => return code,
    };
    let constants = match read_constants(config_json) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let fonts = FontRegistry::discover(&constants);
    let assets = RetryingFetcher::new(LocalAssets::new());
    let ctx = RenderContext {
        doc: &doc,
        constants: &constants,
        fonts: &fonts,
        assets: &assets,
    };

    match render(format, ctx) {
        Ok(bytes) => {
            let len = bytes.len() as u32;
            let buf = bytes.into_boxed_slice();
            *out_buf = Box::into_raw(buf) as *mut u8;
            *out_len = len;
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            ERR_GENERATION
        }
    }
}

/// Compute the chapter → page (or slide) index `format` prints in its table
/// of contents, as a JSON array of `{"chapter", "page"}` objects.
///
/// # Safety
/// Same as `ebook_render`. `*out_json` must be freed with `ebook_free_string`.
#[no_mangle]
pub unsafe extern "C" fn ebook_chapter_page_index(
    json_ptr: *const u8,
    json_len: u32,
    format: *const c_char,
    out_json: *mut *mut c_char,
) -> c_int {
    if json_ptr.is_null() || format.is_null() || out_json.is_null() {
        set_last_error("Null pointer argument");
        return ERR_NULL;
    }

    let doc = match read_document(json_ptr, json_len) {
        Ok(doc) => doc,
        Err(code) => return code,
    };
    let format = match read_format(format) {
        Ok(f) => f,
        Err(code) => return code,
    };

    let constants = LayoutConstants::default();
    let fonts = FontRegistry::discover(&constants);
    let assets = LocalAssets::new();
    let ctx = RenderContext {
        doc: &doc,
        constants: &constants,
        fonts: &fonts,
        assets: &assets,
    };

    let index = match chapter_page_index(format, ctx) {
        Ok(index) => index,
        Err(e) => {
            set_last_error(&e.to_string());
            return ERR_GENERATION;
        }
    };
    match serde_json::to_string(&index) {
        Ok(json) => write_string(out_json, json),
        Err(e) => {
            set_last_error(&e.to_string());
            ERR_GENERATION
        }
    }
}

// ---------------------------------------------------------------------------
// Memory management
// ---------------------------------------------------------------------------

/// Free a buffer returned by `ebook_render`.
///
/// # Safety
/// `buf` must have been returned by `ebook_render`, and `len` must be the
/// corresponding length.
#[no_mangle]
pub unsafe extern "C" fn ebook_free_buffer(buf: *mut u8, len: u32) {
    if !buf.is_null() {
        let _ = Box::from_raw(ptr::slice_from_raw_parts_mut(buf, len as usize));
    }
}

/// Free a string returned by `ebook_generate` or `ebook_chapter_page_index`.
///
/// # Safety
/// `s` must have been returned by Rust's `CString::into_raw`.
#[no_mangle]
pub unsafe extern "C" fn ebook_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = CString::from_raw(s);
    }
}

/// Retrieve the last error message. Returns a null-terminated string.
///
/// The returned pointer is valid until the next `ebook_*` call on the same
/// thread. The caller should **not** free this pointer.
///
/// Returns null if no error has occurred.
#[no_mangle]
pub extern "C" fn ebook_last_error() -> *const c_char {
    LAST_ERROR.with(|e| {
        let borrow = e.borrow();
        match borrow.as_ref() {
            Some(cs) => cs.as_ptr(),
            None => ptr::null(),
        }
    })
}

/// Return the library version as a null-terminated string.
/// The caller must **not** free this pointer.
#[no_mangle]
pub extern "C" fn ebook_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_document;

    fn last_error() -> String {
        let p = ebook_last_error();
        assert!(!p.is_null());
        unsafe { CStr::from_ptr(p) }.to_str().unwrap().to_string()
    }

    #[test]
    fn ffi_generate_writes_every_format() {
        let dir = tempfile::tempdir().unwrap();
        let json = sample_document().to_json();
        let config = serde_json::json!({ "output_dir": dir.path() }).to_string();
        let config = CString::new(config).unwrap();
        let mut report_ptr: *mut c_char = ptr::null_mut();

        let rc = unsafe {
            ebook_generate(
                json.as_ptr(),
                json.len() as u32,
                config.as_ptr(),
                &mut report_ptr,
            )
        };
        assert_eq!(rc, 0, "generation failed: {}", last_error());
        assert!(!report_ptr.is_null());

        let report = unsafe { CStr::from_ptr(report_ptr) }.to_str().unwrap();
        let report: serde_json::Value = serde_json::from_str(report).unwrap();
        for ext in ["pdf", "docx", "pptx", "hwpx"] {
            let name = report["generated_files"][ext].as_str().unwrap();
            assert!(dir.path().join(name).exists(), "{name} missing");
        }

        unsafe { ebook_free_string(report_ptr) };
    }

    #[test]
    fn ffi_render_single_format() {
        let json = sample_document().to_json();
        let format = CString::new("docx").unwrap();
        let mut out_buf: *mut u8 = ptr::null_mut();
        let mut out_len: u32 = 0;

        let rc = unsafe {
            ebook_render(
                json.as_ptr(),
                json.len() as u32,
                format.as_ptr(),
                ptr::null(),
                &mut out_buf,
                &mut out_len,
            )
        };
        assert_eq!(rc, 0);
        let bytes = unsafe { slice::from_raw_parts(out_buf, out_len as usize) };
        assert_eq!(&bytes[0..2], b"PK");

        unsafe { ebook_free_buffer(out_buf, out_len) };
    }

    #[test]
    fn ffi_chapter_page_index() {
        let json = sample_document().to_json();
        let format = CString::new("pptx").unwrap();
        let mut out: *mut c_char = ptr::null_mut();

        let rc = unsafe {
            ebook_chapter_page_index(json.as_ptr(), json.len() as u32, format.as_ptr(), &mut out)
        };
        assert_eq!(rc, 0);
        let json = unsafe { CStr::from_ptr(out) }.to_str().unwrap();
        let entries: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(entries["entries"].as_array().unwrap().len(), 4);
        assert_eq!(entries["entries"][0]["chapter"], 1);

        unsafe { ebook_free_string(out) };
    }

    #[test]
    fn ffi_null_input() {
        let mut out: *mut c_char = ptr::null_mut();
        let rc = unsafe { ebook_generate(ptr::null(), 0, ptr::null(), &mut out) };
        assert_eq!(rc, ERR_NULL);
        assert_eq!(last_error(), "Null pointer argument");
    }

    #[test]
    fn ffi_invalid_utf8() {
        let bad = [0xffu8, 0xfe];
        let mut out: *mut c_char = ptr::null_mut();
        let rc = unsafe { ebook_generate(bad.as_ptr(), 2, ptr::null(), &mut out) };
        assert_eq!(rc, ERR_UTF8);
    }

    #[test]
    fn ffi_unknown_format() {
        let json = sample_document().to_json();
        let format = CString::new("odt").unwrap();
        let mut out: *mut c_char = ptr::null_mut();
        let rc = unsafe {
            ebook_chapter_page_index(json.as_ptr(), json.len() as u32, format.as_ptr(), &mut out)
        };
        assert_eq!(rc, ERR_INPUT);
        assert!(last_error().contains("odt"));
    }

    #[test]
    fn ffi_malformed_config() {
        let json = sample_document().to_json();
        let config = CString::new("{ not json").unwrap();
        let mut out: *mut c_char = ptr::null_mut();
        let rc = unsafe {
            ebook_generate(json.as_ptr(), json.len() as u32, config.as_ptr(), &mut out)
        };
        assert_eq!(rc, ERR_INPUT);
        assert!(out.is_null());
    }

    #[test]
    fn ffi_version() {
        let v = ebook_version();
        let version = unsafe { CStr::from_ptr(v) }.to_str().unwrap();
        assert_eq!(version, env!("CARGO_PKG_VERSION"));
    }
}
