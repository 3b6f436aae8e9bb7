//! Native layer backed by the system `libmysqlclient`.

use super::{
    codes, ColumnSlot, ExecuteError, FetchStatus, InputBind, NativeConnection, NativeDriver,
    NativeError, NativeField, NativeResult, NativeResultSet, NativeStatement,
};
use crate::config::{ConnectOption, ConnectTarget};
use mysqlclient_sys as ffi;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::{c_char, c_uint, c_ulong};
use std::ptr::{self, NonNull};
use std::sync::OnceLock;
use zeroize::Zeroize;

const SSL_MODE_PREFERRED: c_uint = 2;
const SSL_MODE_VERIFY_IDENTITY: c_uint = 5;

static LIBRARY_READY: OnceLock<bool> = OnceLock::new();

/// Boolean-ish return values differ between client library versions.
trait Failed {
    fn failed(self) -> bool;
}

impl Failed for bool {
    fn failed(self) -> bool {
        self
    }
}

impl Failed for i8 {
    fn failed(self) -> bool {
        self != 0
    }
}

impl Failed for u8 {
    fn failed(self) -> bool {
        self != 0
    }
}

impl Failed for i32 {
    fn failed(self) -> bool {
        self != 0
    }
}

unsafe fn text(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

unsafe fn optional_text(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(text(ptr))
    }
}

unsafe fn sqlstate(ptr: *const c_char) -> [u8; 5] {
    let mut state = *b"HY000";
    if !ptr.is_null() {
        let bytes = CStr::from_ptr(ptr).to_bytes();
        if bytes.len() == state.len() {
            state.copy_from_slice(bytes);
        }
    }
    state
}

fn c_string(what: &str, value: &str) -> NativeResult<CString> {
    CString::new(value).map_err(|_| {
        NativeError::new(
            codes::CR_UNKNOWN_ERROR,
            format!("{what} contains an interior NUL byte"),
        )
    })
}

fn optional_c_string(what: &str, value: Option<&str>) -> NativeResult<Option<CString>> {
    value.map(|v| c_string(what, v)).transpose()
}

fn c_ptr(value: &Option<CString>) -> *const c_char {
    value.as_ref().map_or(ptr::null(), |v| v.as_ptr())
}

fn wipe(value: Option<CString>) {
    if let Some(value) = value {
        value.into_bytes_with_nul().zeroize();
    }
}

unsafe fn field_from(field: &ffi::MYSQL_FIELD) -> NativeField {
    NativeField {
        name: text(field.name),
        table: optional_text(field.table).filter(|t| !t.is_empty()),
        default: optional_text(field.def),
        type_code: field.type_ as u32,
        max_length: field.max_length as u64,
        flags: field.flags as u32,
        decimals: field.decimals as u32,
    }
}

/// Driver for the client library linked through `mysqlclient-sys`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibMysqlDriver;

impl LibMysqlDriver {
    pub fn new() -> Self {
        Self
    }
}

impl NativeDriver for LibMysqlDriver {
    fn name(&self) -> &str {
        "libmysqlclient"
    }

    fn init(&self) -> NativeResult<Box<dyn NativeConnection>> {
        let ready = *LIBRARY_READY.get_or_init(|| unsafe {
            ffi::mysql_server_init(0, ptr::null_mut(), ptr::null_mut()) == 0
        });
        if !ready {
            return Err(NativeError::new(
                codes::CR_UNKNOWN_ERROR,
                "mysql_library_init failed",
            ));
        }
        let handle = unsafe { ffi::mysql_init(ptr::null_mut()) };
        let handle = NonNull::new(handle).ok_or_else(|| {
            NativeError::new(codes::CR_OUT_OF_MEMORY, "MySQL client ran out of memory")
        })?;
        Ok(Box::new(LibMysqlConnection {
            handle,
            closed: false,
        }))
    }

    fn client_info(&self) -> String {
        unsafe { text(ffi::mysql_get_client_info()) }
    }
}

struct LibMysqlConnection {
    handle: NonNull<ffi::MYSQL>,
    closed: bool,
}

// The handle is only ever used through `&mut self` or `&self` on one thread at a time.
unsafe impl Send for LibMysqlConnection {}

impl LibMysqlConnection {
    fn raw(&self) -> *mut ffi::MYSQL {
        self.handle.as_ptr()
    }

    fn last_error(&self) -> NativeError {
        unsafe {
            NativeError {
                code: ffi::mysql_errno(self.raw()),
                sqlstate: sqlstate(ffi::mysql_sqlstate(self.raw())),
                message: text(ffi::mysql_error(self.raw())),
            }
        }
    }

    fn check(&self, rc: impl Failed) -> NativeResult<()> {
        if rc.failed() {
            Err(self.last_error())
        } else {
            Ok(())
        }
    }

    fn option_raw(&mut self, option: ffi::mysql_option, arg: *const c_void) -> i32 {
        unsafe { ffi::mysql_options(self.raw(), option, arg) }
    }

    fn option_uint(&mut self, option: ffi::mysql_option, value: c_uint) -> i32 {
        self.option_raw(option, (&value as *const c_uint).cast())
    }

    fn option_bool(&mut self, option: ffi::mysql_option, value: bool) -> i32 {
        let value = u8::from(value);
        self.option_raw(option, (&value as *const u8).cast())
    }

    fn option_str(&mut self, option: ffi::mysql_option, name: &str, value: &str) -> NativeResult<i32> {
        let value = c_string(name, value)?;
        Ok(self.option_raw(option, value.as_ptr().cast()))
    }
}

impl NativeConnection for LibMysqlConnection {
    fn set_option(&mut self, option: &ConnectOption) -> NativeResult<()> {
        use ffi::mysql_option as opt;
        let name = option.name();
        let rc = match option {
            ConnectOption::LocalInfile(on) => {
                self.option_uint(opt::MYSQL_OPT_LOCAL_INFILE, c_uint::from(*on))
            }
            ConnectOption::Reconnect(on) => self.option_bool(opt::MYSQL_OPT_RECONNECT, *on),
            ConnectOption::SslVerifyServerCert(on) => {
                let mode = if *on {
                    SSL_MODE_VERIFY_IDENTITY
                } else {
                    SSL_MODE_PREFERRED
                };
                self.option_uint(opt::MYSQL_OPT_SSL_MODE, mode)
            }
            ConnectOption::ReportDataTruncation(on) => {
                self.option_bool(opt::MYSQL_REPORT_DATA_TRUNCATION, *on)
            }
            // Modern servers always use secure authentication.
            ConnectOption::SecureAuth(true) => 0,
            ConnectOption::SecureAuth(false) => {
                return Err(NativeError::new(
                    codes::CR_UNKNOWN_ERROR,
                    "secure_auth cannot be disabled with this client library",
                ))
            }
            ConnectOption::Protocol(protocol) => {
                self.option_uint(opt::MYSQL_OPT_PROTOCOL, protocol.code())
            }
            ConnectOption::ConnectTimeout(secs) => {
                self.option_uint(opt::MYSQL_OPT_CONNECT_TIMEOUT, *secs)
            }
            ConnectOption::ReadTimeout(secs) => self.option_uint(opt::MYSQL_OPT_READ_TIMEOUT, *secs),
            ConnectOption::WriteTimeout(secs) => {
                self.option_uint(opt::MYSQL_OPT_WRITE_TIMEOUT, *secs)
            }
            ConnectOption::InitCommand(v) => self.option_str(opt::MYSQL_INIT_COMMAND, name, v)?,
            ConnectOption::ReadDefaultFile(v) => {
                self.option_str(opt::MYSQL_READ_DEFAULT_FILE, name, v)?
            }
            ConnectOption::ReadDefaultGroup(v) => {
                self.option_str(opt::MYSQL_READ_DEFAULT_GROUP, name, v)?
            }
            ConnectOption::SetCharsetDir(v) => self.option_str(opt::MYSQL_SET_CHARSET_DIR, name, v)?,
            ConnectOption::SetCharsetName(v) => {
                self.option_str(opt::MYSQL_SET_CHARSET_NAME, name, v)?
            }
            ConnectOption::SharedMemoryBaseName(v) => {
                self.option_str(opt::MYSQL_SHARED_MEMORY_BASE_NAME, name, v)?
            }
            ConnectOption::SslKey(v) => self.option_str(opt::MYSQL_OPT_SSL_KEY, name, v)?,
            ConnectOption::SslCert(v) => self.option_str(opt::MYSQL_OPT_SSL_CERT, name, v)?,
            ConnectOption::SslCa(v) => self.option_str(opt::MYSQL_OPT_SSL_CA, name, v)?,
            ConnectOption::SslCaPath(v) => self.option_str(opt::MYSQL_OPT_SSL_CAPATH, name, v)?,
            ConnectOption::SslCipher(v) => self.option_str(opt::MYSQL_OPT_SSL_CIPHER, name, v)?,
            ConnectOption::Compress => self.option_raw(opt::MYSQL_OPT_COMPRESS, ptr::null()),
            ConnectOption::NamedPipe => self.option_raw(opt::MYSQL_OPT_NAMED_PIPE, ptr::null()),
            ConnectOption::FoundRows => 0,
        };
        if rc != 0 {
            return Err(NativeError::new(
                codes::CR_UNKNOWN_ERROR,
                format!("mysql_options rejected {name}"),
            ));
        }
        Ok(())
    }

    fn real_connect(&mut self, target: &ConnectTarget, client_flags: u64) -> NativeResult<()> {
        let host = optional_c_string("host", target.host.as_deref())?;
        let user = optional_c_string("user", target.user.as_deref())?;
        let password = optional_c_string("password", target.password_str())?;
        let database = optional_c_string("database", target.database.as_deref())?;
        let socket = optional_c_string("socket", target.socket.as_deref())?;
        let connected = unsafe {
            ffi::mysql_real_connect(
                self.raw(),
                c_ptr(&host),
                c_ptr(&user),
                c_ptr(&password),
                c_ptr(&database),
                c_uint::from(target.port.unwrap_or(0)),
                c_ptr(&socket),
                client_flags as c_ulong,
            )
        };
        wipe(password);
        if connected.is_null() {
            return Err(self.last_error());
        }
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            unsafe { ffi::mysql_close(self.raw()) };
        }
    }

    fn ping(&mut self) -> NativeResult<()> {
        let rc = unsafe { ffi::mysql_ping(self.raw()) };
        self.check(rc)
    }

    fn change_user(
        &mut self,
        user: Option<&str>,
        password: Option<&str>,
        database: Option<&str>,
    ) -> NativeResult<()> {
        let user = optional_c_string("user", user)?;
        let password = optional_c_string("password", password)?;
        let database = optional_c_string("database", database)?;
        let rc = unsafe {
            ffi::mysql_change_user(self.raw(), c_ptr(&user), c_ptr(&password), c_ptr(&database))
        };
        wipe(password);
        self.check(rc)
    }

    fn select_db(&mut self, database: &str) -> NativeResult<()> {
        let database = c_string("database", database)?;
        let rc = unsafe { ffi::mysql_select_db(self.raw(), database.as_ptr()) };
        self.check(rc)
    }

    fn real_query(&mut self, sql: &[u8]) -> NativeResult<()> {
        let rc =
            unsafe { ffi::mysql_real_query(self.raw(), sql.as_ptr().cast(), sql.len() as c_ulong) };
        self.check(rc)
    }

    fn store_result(&mut self) -> NativeResult<Option<Box<dyn NativeResultSet>>> {
        let res = unsafe { ffi::mysql_store_result(self.raw()) };
        match NonNull::new(res) {
            Some(res) => Ok(Some(Box::new(LibMysqlResult { res }))),
            None => {
                // NULL is only an error when the statement had a column set to transfer.
                let columns = unsafe { ffi::mysql_field_count(self.raw()) };
                if columns > 0 && unsafe { ffi::mysql_errno(self.raw()) } != 0 {
                    Err(self.last_error())
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn real_escape(&self, input: &[u8]) -> NativeResult<Vec<u8>> {
        let mut out = vec![0u8; input.len() * 2 + 1];
        let written = unsafe {
            ffi::mysql_real_escape_string(
                self.raw(),
                out.as_mut_ptr().cast(),
                input.as_ptr().cast(),
                input.len() as c_ulong,
            )
        };
        if written == c_ulong::MAX {
            return Err(self.last_error());
        }
        out.truncate(written as usize);
        Ok(out)
    }

    fn set_character_set(&mut self, charset: &str) -> NativeResult<()> {
        let charset = c_string("charset", charset)?;
        let rc = unsafe { ffi::mysql_set_character_set(self.raw(), charset.as_ptr()) };
        self.check(rc)
    }

    fn host_info(&self) -> String {
        unsafe { text(ffi::mysql_get_host_info(self.raw())) }
    }

    fn server_info(&self) -> String {
        unsafe { text(ffi::mysql_get_server_info(self.raw())) }
    }

    fn proto_info(&self) -> u32 {
        unsafe { ffi::mysql_get_proto_info(self.raw()) as u32 }
    }

    fn errno(&self) -> u32 {
        unsafe { ffi::mysql_errno(self.raw()) }
    }

    fn error(&self) -> String {
        unsafe { text(ffi::mysql_error(self.raw())) }
    }

    fn affected_rows(&self) -> u64 {
        unsafe { ffi::mysql_affected_rows(self.raw()) }
    }

    fn insert_id(&self) -> u64 {
        unsafe { ffi::mysql_insert_id(self.raw()) }
    }

    fn stmt_init(&mut self) -> NativeResult<Box<dyn NativeStatement>> {
        let stmt = unsafe { ffi::mysql_stmt_init(self.raw()) };
        let stmt = NonNull::new(stmt).ok_or_else(|| self.last_error())?;
        Ok(Box::new(LibMysqlStatement {
            stmt,
            output: OutputIndicators::default(),
            closed: false,
        }))
    }
}

impl Drop for LibMysqlConnection {
    fn drop(&mut self) {
        self.close();
    }
}

struct LibMysqlResult {
    res: NonNull<ffi::MYSQL_RES>,
}

unsafe impl Send for LibMysqlResult {}

impl NativeResultSet for LibMysqlResult {
    fn num_rows(&self) -> u64 {
        unsafe { ffi::mysql_num_rows(self.res.as_ptr()) }
    }

    fn num_fields(&self) -> usize {
        unsafe { ffi::mysql_num_fields(self.res.as_ptr()) as usize }
    }

    fn fetch_row(&mut self) -> Option<Vec<Option<&[u8]>>> {
        let columns = self.num_fields();
        unsafe {
            let row = ffi::mysql_fetch_row(self.res.as_ptr());
            if row.is_null() {
                return None;
            }
            let lengths = ffi::mysql_fetch_lengths(self.res.as_ptr());
            if lengths.is_null() {
                return None;
            }
            let values = std::slice::from_raw_parts(row, columns);
            let lengths = std::slice::from_raw_parts(lengths, columns);
            Some(
                values
                    .iter()
                    .zip(lengths)
                    .map(|(value, len)| {
                        (!value.is_null())
                            .then(|| std::slice::from_raw_parts(value.cast::<u8>(), *len as usize))
                    })
                    .collect(),
            )
        }
    }

    fn data_seek(&mut self, offset: u64) {
        unsafe { ffi::mysql_data_seek(self.res.as_ptr(), offset) }
    }

    fn fetch_field(&mut self) -> Option<NativeField> {
        unsafe { ffi::mysql_fetch_field(self.res.as_ptr()).as_ref().map(|f| field_from(f)) }
    }

    fn fetch_field_direct(&self, index: usize) -> Option<NativeField> {
        if index >= self.num_fields() {
            return None;
        }
        unsafe {
            ffi::mysql_fetch_field_direct(self.res.as_ptr(), index as c_uint)
                .as_ref()
                .map(|f| field_from(f))
        }
    }

    fn fetch_fields(&self) -> Vec<NativeField> {
        let count = self.num_fields();
        unsafe {
            let fields = ffi::mysql_fetch_fields(self.res.as_ptr());
            if fields.is_null() {
                return Vec::new();
            }
            std::slice::from_raw_parts(fields, count)
                .iter()
                .map(|f| field_from(f))
                .collect()
        }
    }
}

impl Drop for LibMysqlResult {
    fn drop(&mut self) {
        unsafe { ffi::mysql_free_result(self.res.as_ptr()) }
    }
}

/// Storage the client library writes through after `mysql_stmt_bind_result`.
#[derive(Default)]
struct OutputIndicators {
    binds: Box<[ffi::MYSQL_BIND]>,
    lengths: Box<[c_ulong]>,
    is_null: Box<[u8]>,
    errors: Box<[u8]>,
}

impl OutputIndicators {
    fn new(columns: usize) -> Self {
        let mut output = Self {
            binds: (0..columns)
                .map(|_| unsafe { std::mem::zeroed::<ffi::MYSQL_BIND>() })
                .collect(),
            lengths: vec![0; columns].into_boxed_slice(),
            is_null: vec![0; columns].into_boxed_slice(),
            errors: vec![0; columns].into_boxed_slice(),
        };
        for i in 0..columns {
            let bind = &mut output.binds[i];
            bind.buffer_type = ffi::enum_field_types::MYSQL_TYPE_STRING;
            bind.buffer = ptr::null_mut();
            bind.buffer_length = 0;
            bind.length = &mut output.lengths[i];
            bind.is_null = (&mut output.is_null[i] as *mut u8).cast();
            bind.error = (&mut output.errors[i] as *mut u8).cast();
        }
        output
    }
}

struct LibMysqlStatement {
    stmt: NonNull<ffi::MYSQL_STMT>,
    output: OutputIndicators,
    closed: bool,
}

unsafe impl Send for LibMysqlStatement {}

impl LibMysqlStatement {
    fn raw(&self) -> *mut ffi::MYSQL_STMT {
        self.stmt.as_ptr()
    }

    fn last_error(&self) -> NativeError {
        unsafe {
            NativeError {
                code: ffi::mysql_stmt_errno(self.raw()),
                sqlstate: sqlstate(ffi::mysql_stmt_sqlstate(self.raw())),
                message: text(ffi::mysql_stmt_error(self.raw())),
            }
        }
    }
}

impl NativeStatement for LibMysqlStatement {
    fn prepare(&mut self, sql: &[u8]) -> NativeResult<()> {
        let rc = unsafe {
            ffi::mysql_stmt_prepare(self.raw(), sql.as_ptr().cast(), sql.len() as c_ulong)
        };
        if rc.failed() {
            return Err(self.last_error());
        }
        Ok(())
    }

    fn param_count(&self) -> usize {
        unsafe { ffi::mysql_stmt_param_count(self.raw()) as usize }
    }

    fn field_count(&self) -> usize {
        unsafe { ffi::mysql_stmt_field_count(self.raw()) as usize }
    }

    fn execute(&mut self, params: &[InputBind<'_>]) -> Result<(), ExecuteError> {
        let mut binds: Vec<ffi::MYSQL_BIND> = params
            .iter()
            .map(|param| {
                let mut bind = unsafe { std::mem::zeroed::<ffi::MYSQL_BIND>() };
                match param {
                    InputBind::Null => {
                        bind.buffer_type = ffi::enum_field_types::MYSQL_TYPE_NULL;
                    }
                    InputBind::String(bytes) => {
                        bind.buffer_type = ffi::enum_field_types::MYSQL_TYPE_STRING;
                        bind.buffer = bytes.as_ptr().cast_mut().cast();
                        bind.buffer_length = bytes.len() as c_ulong;
                    }
                }
                bind
            })
            .collect();
        if !binds.is_empty() {
            let rc = unsafe { ffi::mysql_stmt_bind_param(self.raw(), binds.as_mut_ptr()) };
            if rc.failed() {
                return Err(ExecuteError::Bind(self.last_error()));
            }
        }
        let rc = unsafe { ffi::mysql_stmt_execute(self.raw()) };
        if rc.failed() {
            return Err(ExecuteError::Execute(self.last_error()));
        }
        Ok(())
    }

    fn bind_result(&mut self, columns: usize) -> NativeResult<()> {
        let mut output = OutputIndicators::new(columns);
        if columns > 0 {
            let rc = unsafe { ffi::mysql_stmt_bind_result(self.raw(), output.binds.as_mut_ptr()) };
            if rc.failed() {
                return Err(self.last_error());
            }
        }
        self.output = output;
        Ok(())
    }

    fn fetch(&mut self, slots: &mut [ColumnSlot]) -> FetchStatus {
        let rc = unsafe { ffi::mysql_stmt_fetch(self.raw()) };
        let status = FetchStatus::from_code(rc, || self.last_error());
        if matches!(status, FetchStatus::Row | FetchStatus::Truncated) {
            for (i, slot) in slots.iter_mut().enumerate().take(self.output.lengths.len()) {
                *slot = ColumnSlot {
                    is_null: self.output.is_null[i] != 0,
                    length: self.output.lengths[i] as u64,
                    truncated: self.output.errors[i] != 0,
                };
            }
        }
        status
    }

    fn fetch_column(&mut self, index: usize, buffer: &mut [u8]) -> NativeResult<()> {
        let mut length: c_ulong = 0;
        let mut is_null: u8 = 0;
        let mut error: u8 = 0;
        let mut bind = unsafe { std::mem::zeroed::<ffi::MYSQL_BIND>() };
        bind.buffer_type = ffi::enum_field_types::MYSQL_TYPE_STRING;
        bind.buffer = buffer.as_mut_ptr().cast();
        bind.buffer_length = buffer.len() as c_ulong;
        bind.length = &mut length;
        bind.is_null = (&mut is_null as *mut u8).cast();
        bind.error = (&mut error as *mut u8).cast();
        let rc = unsafe { ffi::mysql_stmt_fetch_column(self.raw(), &mut bind, index as c_uint, 0) };
        if rc.failed() {
            return Err(self.last_error());
        }
        Ok(())
    }

    fn affected_rows(&self) -> u64 {
        unsafe { ffi::mysql_stmt_affected_rows(self.raw()) }
    }

    fn insert_id(&self) -> u64 {
        unsafe { ffi::mysql_stmt_insert_id(self.raw()) }
    }

    fn errno(&self) -> u32 {
        unsafe { ffi::mysql_stmt_errno(self.raw()) }
    }

    fn error(&self) -> String {
        unsafe { text(ffi::mysql_stmt_error(self.raw())) }
    }

    fn result_metadata(&mut self) -> Option<Box<dyn NativeResultSet>> {
        let res = unsafe { ffi::mysql_stmt_result_metadata(self.raw()) };
        NonNull::new(res).map(|res| Box::new(LibMysqlResult { res }) as Box<dyn NativeResultSet>)
    }

    fn close(&mut self) -> NativeResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let rc = unsafe { ffi::mysql_stmt_close(self.raw()) };
        if rc.failed() {
            return Err(NativeError::new(
                codes::CR_UNKNOWN_ERROR,
                "mysql_stmt_close failed",
            ));
        }
        Ok(())
    }
}

impl Drop for LibMysqlStatement {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
