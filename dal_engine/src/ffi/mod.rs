// Allow FFI functions to dereference raw pointers without being marked unsafe
// This is expected and safe for extern "C" FFI boundaries
#![allow(clippy::not_unsafe_ptr_arg_deref)]
#![allow(non_snake_case)]

use crate::document::Delimiter;
use crate::engine::DalConnection;
use crate::error::{DalError, ErrorSlot, Result, DAL_ERROR, DAL_OK};
use crate::handles::{ConnectionHandle, HandleRegistry, QueryHandle, RecordHandle, ResponseHandle};
use crate::protocol::AttrCode;
use std::ffi::CStr;
use std::os::raw::{c_char, c_double, c_int};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

/// Returned by string getters when the requested value is null.
pub const DAL_NULL: c_int = -2;

struct GlobalState {
    // Each connection has its own lock so fetches do not hold the global one
    connections: HandleRegistry<Arc<Mutex<DalConnection>>>,
    // Last failure of any dal_* call, independent of connection
    last_error: ErrorSlot,
}

static GLOBAL_STATE: OnceLock<Mutex<GlobalState>> = OnceLock::new();

fn get_global_state() -> &'static Mutex<GlobalState> {
    GLOBAL_STATE.get_or_init(|| {
        Mutex::new(GlobalState {
            connections: HandleRegistry::new(),
            last_error: ErrorSlot::new(),
        })
    })
}

/// Returns None if the mutex was poisoned. The poisoning is posted to the
/// last-error slot and cleared, so the next call proceeds.
fn try_lock_global_state() -> Option<MutexGuard<'static, GlobalState>> {
    let mutex = get_global_state();
    match mutex.lock() {
        Ok(guard) => Some(guard),
        Err(poisoned) => {
            let mut guard = poisoned.into_inner();
            guard
                .last_error
                .post(&DalError::LockPoisoned("global state".to_string()));
            drop(guard);
            mutex.clear_poison();
            None
        }
    }
}

fn post_global(err: &DalError) {
    if let Some(mut state) = try_lock_global_state() {
        state.last_error.post(err);
    }
}

fn post_failure<T>(state: &mut GlobalState, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            state.last_error.post(&err);
            None
        }
    }
}

/// Runs `f` against connection `conn` holding only that connection's
/// lock. Failures are posted to the global error slot.
fn with_connection<T>(conn: c_int, f: impl FnOnce(&mut DalConnection) -> Result<T>) -> Option<T> {
    let connection = {
        let mut guard = try_lock_global_state()?;
        let state = &mut *guard;
        let found = ConnectionHandle::checked(conn)
            .and_then(|handle| state.connections.get(handle.handle()).map(Arc::clone));
        post_failure(state, found)?
    };

    let result = match connection.lock() {
        Ok(mut guard) => f(&mut *guard),
        Err(_) => Err(DalError::LockPoisoned(format!("connection {}", conn))),
    };
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            post_global(&err);
            None
        }
    }
}

fn read_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    // Safety: `ptr` must be a valid null-terminated C string that outlives
    // the current call
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

fn required_str<'a>(ptr: *const c_char, missing: impl FnOnce() -> DalError) -> Result<&'a str> {
    read_str(ptr).ok_or_else(missing)
}

fn attr_code(code: c_int) -> Result<AttrCode> {
    AttrCode::from_code(code).ok_or_else(|| DalError::AttrNotFound(format!("code {}", code)))
}

fn to_c_int(value: usize) -> c_int {
    c_int::try_from(value).unwrap_or(c_int::MAX)
}

/// Copies `text` plus a terminating NUL into `buffer`. Returns the text
/// length, or [`DAL_NULL`] for a null value.
fn write_text(text: Option<&str>, buffer: *mut c_char, buffer_len: c_int) -> Result<c_int> {
    let Some(text) = text else {
        return Ok(DAL_NULL);
    };
    let capacity = usize::try_from(buffer_len).unwrap_or(0);
    if buffer.is_null() || text.len() >= capacity {
        return Err(DalError::BufferTooSmall {
            needed: text.len() + 1,
            got: if buffer.is_null() { 0 } else { capacity },
        });
    }

    // Safety: `buffer` must be valid for writes of `buffer_len` bytes;
    // text.len() + 1 <= buffer_len was checked above
    unsafe {
        std::ptr::copy_nonoverlapping(text.as_ptr(), buffer as *mut u8, text.len());
        *buffer.add(text.len()) = 0;
    }
    Ok(to_c_int(text.len()))
}

fn status(result: Option<()>) -> c_int {
    result.map_or(DAL_ERROR, |_| DAL_OK)
}

// ---- connections ----

/// Opens a connection.
/// base_url, protocol, version: null-terminated UTF-8 strings
/// Returns: connection handle (>0) on success, DAL_ERROR on failure
#[no_mangle]
pub extern "C" fn dal_openConnection(
    base_url: *const c_char,
    protocol: *const c_char,
    version: *const c_char,
) -> c_int {
    let Some(mut guard) = try_lock_global_state() else {
        return DAL_ERROR;
    };
    let state = &mut *guard;

    let opened = required_str(base_url, || DalError::NoBaseUrl).and_then(|base_url| {
        let protocol = required_str(protocol, || DalError::NoProtocol)?;
        let version = required_str(version, || DalError::NoVersion)?;
        DalConnection::open(base_url, protocol, version)
    });
    let result = opened.and_then(|conn| state.connections.insert(Arc::new(Mutex::new(conn))));
    post_failure(state, result).map_or(DAL_ERROR, |handle| ConnectionHandle::new(handle).raw())
}

/// Closes a connection and every handle derived from it.
#[no_mangle]
pub extern "C" fn dal_closeConnection(conn: c_int) -> c_int {
    let Some(mut guard) = try_lock_global_state() else {
        return DAL_ERROR;
    };
    let state = &mut *guard;
    let result = ConnectionHandle::checked(conn).and_then(|handle| state.connections.remove(handle.handle()));
    let Some(connection) = post_failure(state, result) else {
        return DAL_ERROR;
    };
    drop(guard);
    // A call still running on another thread drops the last reference
    if let Ok(connection) = Arc::try_unwrap(connection) {
        if let Ok(connection) = connection.into_inner() {
            connection.close();
        }
    }
    DAL_OK
}

// ---- queries ----

#[no_mangle]
pub extern "C" fn dal_getQuery(conn: c_int) -> c_int {
    with_connection(conn, |c| c.new_query()).map_or(DAL_ERROR, QueryHandle::raw)
}

#[no_mangle]
pub extern "C" fn dal_getConeQuery(conn: c_int, ra: c_double, dec: c_double, sr: c_double) -> c_int {
    with_connection(conn, |c| c.cone_query(ra, dec, sr)).map_or(DAL_ERROR, QueryHandle::raw)
}

/// format: optional (may be null)
#[no_mangle]
pub extern "C" fn dal_getImageQuery(
    conn: c_int,
    ra: c_double,
    dec: c_double,
    ra_size: c_double,
    dec_size: c_double,
    format: *const c_char,
) -> c_int {
    let format = read_str(format);
    with_connection(conn, |c| c.image_query(ra, dec, ra_size, dec_size, format))
        .map_or(DAL_ERROR, QueryHandle::raw)
}

/// band, time, format: optional (may be null)
#[no_mangle]
pub extern "C" fn dal_getSpectrumQuery(
    conn: c_int,
    ra: c_double,
    dec: c_double,
    size: c_double,
    band: *const c_char,
    time: *const c_char,
    format: *const c_char,
) -> c_int {
    let (band, time, format) = (read_str(band), read_str(time), read_str(format));
    with_connection(conn, |c| c.spectrum_query(ra, dec, size, band, time, format))
        .map_or(DAL_ERROR, QueryHandle::raw)
}

#[no_mangle]
pub extern "C" fn dal_closeQuery(conn: c_int, query: c_int) -> c_int {
    status(with_connection(conn, |c| c.close_query(QueryHandle::checked(query)?)))
}

#[no_mangle]
pub extern "C" fn dal_addStringParam(
    conn: c_int,
    query: c_int,
    name: *const c_char,
    value: *const c_char,
) -> c_int {
    status(with_connection(conn, |c| {
        let name = required_str(name, || DalError::ParamNotFound("<null>".to_string()))?;
        let value = read_str(value).unwrap_or("");
        c.query_mut(QueryHandle::checked(query)?)?.add_string_param(name, value);
        Ok(())
    }))
}

#[no_mangle]
pub extern "C" fn dal_addIntParam(conn: c_int, query: c_int, name: *const c_char, value: i64) -> c_int {
    status(with_connection(conn, |c| {
        let name = required_str(name, || DalError::ParamNotFound("<null>".to_string()))?;
        c.query_mut(QueryHandle::checked(query)?)?.add_int_param(name, value);
        Ok(())
    }))
}

#[no_mangle]
pub extern "C" fn dal_addFloatParam(conn: c_int, query: c_int, name: *const c_char, value: c_double) -> c_int {
    status(with_connection(conn, |c| {
        let name = required_str(name, || DalError::ParamNotFound("<null>".to_string()))?;
        c.query_mut(QueryHandle::checked(query)?)?.add_float_param(name, value);
        Ok(())
    }))
}

#[no_mangle]
pub extern "C" fn dal_getParamCount(conn: c_int, query: c_int) -> c_int {
    with_connection(conn, |c| Ok(c.query(QueryHandle::checked(query)?)?.param_count()))
        .map_or(DAL_ERROR, to_c_int)
}

/// Writes the full query URL into `buffer`.
/// Returns: URL length, or -1 on failure
#[no_mangle]
pub extern "C" fn dal_getQueryURL(conn: c_int, query: c_int, buffer: *mut c_char, buffer_len: c_int) -> c_int {
    with_connection(conn, |c| {
        let url = c.query_url(QueryHandle::checked(query)?)?;
        write_text(Some(&url), buffer, buffer_len)
    })
    .unwrap_or(-1)
}

/// Fetches and builds the query's response.
/// Returns: response handle (>0) on success, DAL_ERROR on failure
#[no_mangle]
pub extern "C" fn dal_executeQuery(conn: c_int, query: c_int) -> c_int {
    with_connection(conn, |c| c.execute_query(QueryHandle::checked(query)?))
        .map_or(DAL_ERROR, ResponseHandle::raw)
}

#[no_mangle]
pub extern "C" fn dal_getQueryResponse(conn: c_int, query: c_int) -> c_int {
    with_connection(conn, |c| c.query_response(QueryHandle::checked(query)?))
        .map_or(DAL_ERROR, ResponseHandle::raw)
}

// ---- responses ----

/// Builds a response from document text held by the caller.
#[no_mangle]
pub extern "C" fn dal_initQueryResponse(
    conn: c_int,
    text: *const c_char,
    resource: c_int,
    table: c_int,
) -> c_int {
    with_connection(conn, |c| {
        let text = required_str(text, || DalError::DocumentParse("document text is null".to_string()))?;
        let resource = usize::try_from(resource).map_err(|_| DalError::NoResource { index: 0 })?;
        let table = usize::try_from(table).map_err(|_| DalError::NoTable { index: 0 })?;
        c.init_query_response(text, resource, table)
    })
    .map_or(DAL_ERROR, ResponseHandle::raw)
}

#[no_mangle]
pub extern "C" fn dal_closeQueryResponse(conn: c_int, response: c_int) -> c_int {
    status(with_connection(conn, |c| {
        c.close_query_response(ResponseHandle::checked(response)?)
    }))
}

fn response_count(conn: c_int, response: c_int, count: impl FnOnce(&crate::engine::QueryResponse) -> usize) -> c_int {
    with_connection(conn, |c| Ok(count(c.response(ResponseHandle::checked(response)?)?)))
        .map_or(DAL_ERROR, to_c_int)
}

#[no_mangle]
pub extern "C" fn dal_getRecordCount(conn: c_int, response: c_int) -> c_int {
    response_count(conn, response, |qr| qr.record_count())
}

#[no_mangle]
pub extern "C" fn dal_getColumnCount(conn: c_int, response: c_int) -> c_int {
    response_count(conn, response, |qr| qr.column_count())
}

#[no_mangle]
pub extern "C" fn dal_getFieldCount(conn: c_int, response: c_int) -> c_int {
    response_count(conn, response, |qr| qr.field_count())
}

#[no_mangle]
pub extern "C" fn dal_getInfoCount(conn: c_int, response: c_int) -> c_int {
    response_count(conn, response, |qr| qr.info_count())
}

#[no_mangle]
pub extern "C" fn dal_getPropCount(conn: c_int, response: c_int) -> c_int {
    response_count(conn, response, |qr| qr.property_count())
}

/// attr: ID=1, NAME=2, UTYPE=3, UCD=4
#[no_mangle]
pub extern "C" fn dal_getFieldIndex(conn: c_int, response: c_int, key: *const c_char, attr: c_int) -> c_int {
    with_connection(conn, |c| {
        let attr = attr_code(attr)?;
        let key = required_str(key, || DalError::FieldNotFound {
            key: String::new(),
            attr: attr.to_string(),
        })?;
        c.get_field_index(ResponseHandle::checked(response)?, key, attr)
    })
    .map_or(DAL_ERROR, to_c_int)
}

/// Returns: value length, DAL_NULL for a null value, -1 on failure
#[no_mangle]
pub extern "C" fn dal_getFieldAttr(
    conn: c_int,
    response: c_int,
    index: c_int,
    attr: c_int,
    buffer: *mut c_char,
    buffer_len: c_int,
) -> c_int {
    with_connection(conn, |c| {
        let value = c.get_field_attr(ResponseHandle::checked(response)?, index, attr_code(attr)?)?;
        write_text(value, buffer, buffer_len)
    })
    .unwrap_or(-1)
}

#[no_mangle]
pub extern "C" fn dal_getInfoAttr(
    conn: c_int,
    response: c_int,
    index: c_int,
    attr: c_int,
    buffer: *mut c_char,
    buffer_len: c_int,
) -> c_int {
    with_connection(conn, |c| {
        let value = c.get_info_attr(ResponseHandle::checked(response)?, index, attr_code(attr)?)?;
        write_text(value, buffer, buffer_len)
    })
    .unwrap_or(-1)
}

#[no_mangle]
pub extern "C" fn dal_getPropName(
    conn: c_int,
    response: c_int,
    index: c_int,
    buffer: *mut c_char,
    buffer_len: c_int,
) -> c_int {
    with_connection(conn, |c| {
        let name = c.get_prop_name(ResponseHandle::checked(response)?, index)?;
        write_text(Some(name), buffer, buffer_len)
    })
    .unwrap_or(-1)
}

/// Converts the response to delimited text. delimiter: ',', '\t' or ' '
#[no_mangle]
pub extern "C" fn dal_exportDelimited(
    conn: c_int,
    response: c_int,
    delimiter: c_char,
    buffer: *mut c_char,
    buffer_len: c_int,
) -> c_int {
    with_connection(conn, |c| {
        let delimiter = Delimiter::from_char(delimiter as u8 as char)
            .ok_or_else(|| DalError::ExecuteQuery(format!("unsupported delimiter {:?}", delimiter as u8 as char)))?;
        let text = c.export_delimited(ResponseHandle::checked(response)?, delimiter)?;
        write_text(Some(&text), buffer, buffer_len)
    })
    .unwrap_or(-1)
}

// ---- records ----

#[no_mangle]
pub extern "C" fn dal_getRecord(conn: c_int, response: c_int, recnum: c_int) -> c_int {
    with_connection(conn, |c| c.get_record(ResponseHandle::checked(response)?, recnum))
        .map_or(DAL_ERROR, RecordHandle::raw)
}

#[no_mangle]
pub extern "C" fn dal_releaseRecord(conn: c_int, record: c_int) -> c_int {
    status(with_connection(conn, |c| c.release_record(RecordHandle::checked(record)?)))
}

#[no_mangle]
pub extern "C" fn dal_getIntField(conn: c_int, record: c_int, index: c_int) -> i64 {
    with_connection(conn, |c| c.get_int_field(RecordHandle::checked(record)?, index))
        .unwrap_or(i64::from(DAL_ERROR))
}

#[no_mangle]
pub extern "C" fn dal_getFloatField(conn: c_int, record: c_int, index: c_int) -> c_double {
    with_connection(conn, |c| c.get_float_field(RecordHandle::checked(record)?, index))
        .unwrap_or(f64::from(DAL_ERROR))
}

#[no_mangle]
pub extern "C" fn dal_getStringField(
    conn: c_int,
    record: c_int,
    index: c_int,
    buffer: *mut c_char,
    buffer_len: c_int,
) -> c_int {
    with_connection(conn, |c| {
        let value = c.get_string_field(RecordHandle::checked(record)?, index)?;
        write_text(value, buffer, buffer_len)
    })
    .unwrap_or(-1)
}

fn property_name<'a>(name: *const c_char) -> Result<&'a str> {
    required_str(name, || DalError::PropertyNotFound("<null>".to_string()))
}

#[no_mangle]
pub extern "C" fn dal_getIntProperty(conn: c_int, record: c_int, name: *const c_char) -> i64 {
    with_connection(conn, |c| c.get_int_property(RecordHandle::checked(record)?, property_name(name)?))
        .unwrap_or(i64::from(DAL_ERROR))
}

#[no_mangle]
pub extern "C" fn dal_getFloatProperty(conn: c_int, record: c_int, name: *const c_char) -> c_double {
    with_connection(conn, |c| c.get_float_property(RecordHandle::checked(record)?, property_name(name)?))
        .unwrap_or(f64::from(DAL_ERROR))
}

#[no_mangle]
pub extern "C" fn dal_getStringProperty(
    conn: c_int,
    record: c_int,
    name: *const c_char,
    buffer: *mut c_char,
    buffer_len: c_int,
) -> c_int {
    with_connection(conn, |c| {
        let value = c.get_string_property(RecordHandle::checked(record)?, property_name(name)?)?;
        write_text(value, buffer, buffer_len)
    })
    .unwrap_or(-1)
}

/// Downloads the dataset at `acref` to the file `path`.
#[no_mangle]
pub extern "C" fn dal_getDataset(
    conn: c_int,
    record: c_int,
    acref: *const c_char,
    path: *const c_char,
) -> c_int {
    status(with_connection(conn, |c| {
        let acref = required_str(acref, || DalError::InvalidUrl("<null>".to_string()))?;
        let path = required_str(path, || DalError::InvalidFilename("<null>".to_string()))?;
        c.get_dataset(RecordHandle::checked(record)?, acref, path).map(|_| ())
    }))
}

// ---- errors ----

/// Code of the last failure, or DAL_OK.
#[no_mangle]
pub extern "C" fn dal_getError() -> c_int {
    try_lock_global_state().map_or(DAL_ERROR, |state| state.last_error.code())
}

/// Writes the last failure's message into `buffer`, truncating to fit.
/// Returns: bytes written (0 when no error is posted), -1 on failure
#[no_mangle]
pub extern "C" fn dal_getErrorMsg(buffer: *mut c_char, buffer_len: c_int) -> c_int {
    if buffer.is_null() || buffer_len <= 0 {
        return -1;
    }

    let Some(state) = try_lock_global_state() else {
        return -1;
    };

    let message = state.last_error.message().unwrap_or("");
    let msg_bytes = message.as_bytes();
    let mut copy_len = msg_bytes.len().min(buffer_len as usize - 1);
    while !message.is_char_boundary(copy_len) {
        copy_len -= 1;
    }

    // Safety: `buffer` must be valid for writes of `copy_len + 1` bytes
    // Caller ensures buffer is large enough (buffer_len > 0 verified above)
    unsafe {
        std::ptr::copy_nonoverlapping(msg_bytes.as_ptr(), buffer as *mut u8, copy_len);
        *buffer.add(copy_len) = 0;
    }

    to_c_int(copy_len)
}

#[no_mangle]
pub extern "C" fn dal_clearError() {
    if let Some(mut state) = try_lock_global_state() {
        state.last_error.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Element;
    use serial_test::serial;
    use std::ffi::CString;

    fn cstr(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    /// Helper to get error message after FFI call fails
    fn get_last_error() -> String {
        let mut buffer = vec![0u8; 1024];
        let result = dal_getErrorMsg(buffer.as_mut_ptr() as *mut c_char, buffer.len() as c_int);
        if result < 0 {
            return "Failed to get error".to_string();
        }
        String::from_utf8_lossy(&buffer[..result as usize]).to_string()
    }

    fn read_string(f: impl FnOnce(*mut c_char, c_int) -> c_int) -> Option<String> {
        let mut buffer = vec![0u8; 256];
        let n = f(buffer.as_mut_ptr() as *mut c_char, buffer.len() as c_int);
        if n < 0 {
            return None;
        }
        Some(String::from_utf8_lossy(&buffer[..n as usize]).to_string())
    }

    fn document() -> String {
        let doc = Element::new("VOTABLE").with_child(
            Element::new("RESOURCE").with_child(
                Element::new("TABLE")
                    .with_child(Element::new("FIELD").with_attr("name", "id"))
                    .with_child(Element::new("FIELD").with_attr("name", "ra").with_attr("ucd", "pos.eq.ra;meta.main"))
                    .with_child(
                        Element::new("DATA").with_child(
                            Element::new("TABLEDATA")
                                .with_child(Element::tr(["a", "10.5"]))
                                .with_child(Element::new("TR").with_child(Element::td("b"))),
                        ),
                    ),
            ),
        );
        serde_json::to_string(&doc).unwrap()
    }

    fn open() -> c_int {
        let (url, protocol, version) = (cstr("http://localhost/none"), cstr("scs"), cstr("1.0"));
        let conn = dal_openConnection(url.as_ptr(), protocol.as_ptr(), version.as_ptr());
        assert!(conn > 0, "dal_openConnection failed: {}", get_last_error());
        conn
    }

    #[test]
    #[serial]
    fn test_ffi_open_requires_protocol() {
        dal_clearError();
        let url = cstr("http://localhost/none");
        let conn = dal_openConnection(url.as_ptr(), std::ptr::null(), std::ptr::null());
        assert_eq!(conn, DAL_ERROR);
        assert_eq!(dal_getError(), 105);
        assert!(get_last_error().contains("protocol"));
    }

    #[test]
    #[serial]
    fn test_ffi_response_access() {
        dal_clearError();
        let conn = open();
        let text = cstr(&document());
        let qr = dal_initQueryResponse(conn, text.as_ptr(), 0, 0);
        assert!(qr > 0, "init failed: {}", get_last_error());

        assert_eq!(dal_getRecordCount(conn, qr), 2);
        assert_eq!(dal_getFieldCount(conn, qr), 2);
        let key = cstr("RA");
        assert_eq!(dal_getFieldIndex(conn, qr, key.as_ptr(), AttrCode::Name.code()), 1);

        let rec = dal_getRecord(conn, qr, 0);
        assert!(rec > 0);
        assert_eq!(dal_getFloatField(conn, rec, 1), 10.5);
        assert_eq!(
            read_string(|b, n| dal_getStringField(conn, rec, 0, b, n)).as_deref(),
            Some("a")
        );
        let ra = cstr("ra");
        assert_eq!(dal_getFloatProperty(conn, rec, ra.as_ptr()), 10.5);

        // second row is short: the padded cell is null
        let short = dal_getRecord(conn, qr, 1);
        let mut buffer = [0 as c_char; 8];
        assert_eq!(dal_getStringField(conn, short, 1, buffer.as_mut_ptr(), 8), DAL_NULL);

        assert_eq!(dal_getRecord(conn, qr, 2), DAL_ERROR);
        assert_eq!(dal_getError(), 135);

        assert_eq!(dal_closeConnection(conn), DAL_OK);
    }

    #[test]
    #[serial]
    fn test_ffi_stale_handles() {
        dal_clearError();
        let conn = open();
        let text = cstr(&document());
        let qr = dal_initQueryResponse(conn, text.as_ptr(), 0, 0);
        let rec = dal_getRecord(conn, qr, 0);
        assert_eq!(dal_closeQueryResponse(conn, qr), DAL_OK);

        assert_eq!(dal_getIntField(conn, rec, 0), i64::from(DAL_ERROR));
        assert_eq!(dal_getError(), 100);
        assert_eq!(dal_getRecordCount(conn, qr), DAL_ERROR);

        assert_eq!(dal_closeConnection(conn), DAL_OK);
        assert_eq!(dal_getQuery(conn), DAL_ERROR);
        assert_eq!(dal_closeConnection(conn), DAL_ERROR);
    }

    #[test]
    #[serial]
    fn test_ffi_query_params_and_url() {
        dal_clearError();
        let conn = open();
        let query = dal_getConeQuery(conn, 10.0, 20.0, 0.5);
        assert!(query > 0);
        let name = cstr("VERB");
        assert_eq!(dal_addIntParam(conn, query, name.as_ptr(), 3), DAL_OK);
        assert_eq!(dal_getParamCount(conn, query), 4);
        assert_eq!(
            read_string(|b, n| dal_getQueryURL(conn, query, b, n)).as_deref(),
            Some("http://localhost/none?RA=10&DEC=20&SR=0.5&VERB=3")
        );

        let mut tiny = [0 as c_char; 4];
        assert_eq!(dal_getQueryURL(conn, query, tiny.as_mut_ptr(), 4), -1);
        assert_eq!(dal_getError(), 146);

        assert_eq!(dal_getQueryResponse(conn, query), DAL_ERROR);
        assert_eq!(dal_getError(), 123);
        assert_eq!(dal_closeConnection(conn), DAL_OK);
    }

    #[test]
    #[serial]
    fn test_ffi_connection_work_runs_without_global_lock() {
        dal_clearError();
        let conn = open();
        let free = with_connection(conn, |_| Ok(get_global_state().try_lock().is_ok()));
        assert_eq!(free, Some(true));
        assert_eq!(dal_closeConnection(conn), DAL_OK);
    }

    #[test]
    #[serial]
    fn test_ffi_poisoned_connection_posts_error() {
        dal_clearError();
        let conn = open();
        let connection = {
            let state = try_lock_global_state().unwrap();
            let handle = ConnectionHandle::checked(conn).unwrap();
            Arc::clone(state.connections.get(handle.handle()).unwrap())
        };
        let poisoner = Arc::clone(&connection);
        let joined = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison connection lock");
        })
        .join();
        assert!(joined.is_err());
        drop(connection);

        assert_eq!(dal_getQuery(conn), DAL_ERROR);
        assert_eq!(dal_getError(), 102);
        assert!(get_last_error().contains(&format!("connection {}", conn)));
        assert_eq!(dal_closeConnection(conn), DAL_OK);
    }

    #[test]
    #[serial]
    fn test_ffi_poisoned_global_state_recovers() {
        dal_clearError();
        let joined = std::thread::spawn(|| {
            let _guard = get_global_state().lock().unwrap();
            panic!("poison global lock");
        })
        .join();
        assert!(joined.is_err());

        // the call that finds the poison fails and reports it
        assert_eq!(dal_getError(), DAL_ERROR);
        assert_eq!(dal_getError(), 102);
        assert!(get_last_error().contains("global state"));
        dal_clearError();
        assert_eq!(dal_getError(), DAL_OK);
    }

    #[test]
    #[serial]
    fn test_ffi_clear_error() {
        assert_eq!(dal_closeQuery(0, 1), DAL_ERROR);
        assert_ne!(dal_getError(), DAL_OK);
        dal_clearError();
        assert_eq!(dal_getError(), DAL_OK);
        assert_eq!(get_last_error(), "");
    }
}
