use super::builder::ResponseBuilder;
use super::properties::PropertyWriter;
use super::query::Query;
use super::record::Record;
use super::response::QueryResponse;
use crate::config::ClientConfig;
use crate::document::{Delimiter, DocumentCodec, JsonDocumentCodec, VoNode};
use crate::error::{DalError, ErrorCategory, ErrorSlot, Result, StructuredError};
use crate::handles::{HandleContext, QueryHandle, RecordHandle, RecordRef, ResponseHandle};
use crate::observability::StructuredLogger;
use crate::plugins::{PluginRegistry, PropertyMapper};
use crate::protocol::{AttrCode, ServiceType};
use crate::transport::{default_transport, Transport};
use log::{debug, Level};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Posts a failure into `slot` and hands the result back unchanged.
fn tracked<T>(slot: &RefCell<ErrorSlot>, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        debug!("Posting error {}: {}", err.code(), err);
        slot.borrow_mut().post(err);
    }
    result
}

fn non_negative(value: i32) -> Option<usize> {
    usize::try_from(value).ok()
}

/// A service endpoint plus every query, response and record derived
/// from it. Closing (or dropping) the connection invalidates them all.
///
/// Every method returns a `Result`; failures are also posted to the
/// connection's error slot for callers that poll [`error_code`].
///
/// [`error_code`]: DalConnection::error_code
pub struct DalConnection {
    base_url: String,
    protocol: String,
    version: String,
    service: ServiceType,
    config: ClientConfig,
    handles: HandleContext,
    errors: RefCell<ErrorSlot>,
    transport: Box<dyn Transport>,
    codec: Box<dyn DocumentCodec>,
    mappers: PluginRegistry,
    logger: StructuredLogger,
}

impl DalConnection {
    /// Opens a connection configured from the environment.
    pub fn open(base_url: &str, protocol: &str, version: &str) -> Result<Self> {
        let config = ClientConfig::from_env();
        let transport = default_transport(&config);
        Self::open_with(base_url, protocol, version, config, transport)
    }

    pub fn open_with(
        base_url: &str,
        protocol: &str,
        version: &str,
        config: ClientConfig,
        transport: Box<dyn Transport>,
    ) -> Result<Self> {
        if protocol.trim().is_empty() {
            return Err(DalError::NoProtocol);
        }
        if version.trim().is_empty() {
            return Err(DalError::NoVersion);
        }
        if base_url.trim().is_empty() {
            return Err(DalError::NoBaseUrl);
        }

        let logger = StructuredLogger::new(config.logging_enabled);
        logger.log_connection(Level::Info, base_url, "open");
        Ok(Self {
            base_url: base_url.trim().to_string(),
            protocol: protocol.to_string(),
            version: version.to_string(),
            service: ServiceType::from_protocol(protocol),
            config,
            handles: HandleContext::new(),
            errors: RefCell::new(ErrorSlot::new()),
            transport,
            codec: Box::new(JsonDocumentCodec::new()),
            mappers: PluginRegistry::default(),
            logger,
        })
    }

    pub fn open_cone(base_url: &str, version: &str) -> Result<Self> {
        Self::open(base_url, "scs", version)
    }

    pub fn open_image(base_url: &str, version: &str) -> Result<Self> {
        Self::open(base_url, "sia", version)
    }

    pub fn open_spectrum(base_url: &str, version: &str) -> Result<Self> {
        Self::open(base_url, "ssa", version)
    }

    /// Replaces the codec used to read fetched documents.
    pub fn with_codec(mut self, codec: Box<dyn DocumentCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Replaces the property mapper for the mapper's service type.
    pub fn register_mapper(&mut self, mapper: Arc<dyn PropertyMapper>) {
        self.mappers.register(mapper);
    }

    /// Releases every query, response and record handle.
    pub fn close(mut self) {
        self.handles.clear();
        self.logger.log_connection(Level::Info, &self.base_url, "close");
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_base_url(&mut self, base_url: &str) -> Result<()> {
        if base_url.trim().is_empty() {
            return tracked(&self.errors, Err(DalError::NoBaseUrl));
        }
        self.base_url = base_url.trim().to_string();
        Ok(())
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn service_type(&self) -> ServiceType {
        self.service
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn handles(&self) -> &HandleContext {
        &self.handles
    }

    // ---- posted error slot ----

    pub fn last_error(&self) -> Option<StructuredError> {
        self.errors.borrow().last().cloned()
    }

    pub fn error_code(&self) -> i32 {
        self.errors.borrow().code()
    }

    pub fn error_message(&self) -> Option<String> {
        self.errors.borrow().message().map(str::to_string)
    }

    pub fn clear_error(&self) {
        self.errors.borrow_mut().clear();
    }

    // ---- queries ----

    pub fn new_query(&mut self) -> Result<QueryHandle> {
        self.create_query(Query::new())
    }

    pub fn create_query(&mut self, query: Query) -> Result<QueryHandle> {
        let result = self.handles.create_query(query);
        tracked(&self.errors, result)
    }

    pub fn cone_query(&mut self, ra: f64, dec: f64, sr: f64) -> Result<QueryHandle> {
        self.create_query(Query::cone(ra, dec, sr))
    }

    pub fn image_query(
        &mut self,
        ra: f64,
        dec: f64,
        ra_size: f64,
        dec_size: f64,
        format: Option<&str>,
    ) -> Result<QueryHandle> {
        let query = Query::image(&self.version, ra, dec, ra_size, dec_size, format);
        self.create_query(query)
    }

    pub fn spectrum_query(
        &mut self,
        ra: f64,
        dec: f64,
        size: f64,
        band: Option<&str>,
        time: Option<&str>,
        format: Option<&str>,
    ) -> Result<QueryHandle> {
        self.create_query(Query::spectrum(ra, dec, size, band, time, format))
    }

    pub fn query(&self, handle: QueryHandle) -> Result<&Query> {
        tracked(&self.errors, self.handles.get_query(handle))
    }

    pub fn query_mut(&mut self, handle: QueryHandle) -> Result<&mut Query> {
        tracked(&self.errors, self.handles.get_query_mut(handle))
    }

    /// Closing a query leaves the responses it produced open.
    pub fn close_query(&mut self, handle: QueryHandle) -> Result<()> {
        let result = self.handles.remove_query(handle).map(|_| ());
        tracked(&self.errors, result)
    }

    pub fn query_url(&self, handle: QueryHandle) -> Result<String> {
        let result = self
            .handles
            .get_query(handle)
            .and_then(|q| q.query_url(&self.base_url));
        tracked(&self.errors, result)
    }

    /// Fetches, parses and builds the first table of the response, runs
    /// the protocol's property mapper and registers the result as the
    /// query's current response. Earlier responses stay valid.
    pub fn execute_query(&mut self, handle: QueryHandle) -> Result<ResponseHandle> {
        let result = self.execute_inner(handle);
        if let Err(err) = &result {
            self.log_failure(err, "execute");
        }
        tracked(&self.errors, result)
    }

    fn log_failure(&self, err: &DalError, action: &str) {
        if matches!(err.error_category(), ErrorCategory::Transport | ErrorCategory::Fatal) {
            let mut metadata = HashMap::new();
            metadata.insert("action".to_string(), action.to_string());
            metadata.insert("code".to_string(), err.code().to_string());
            metadata.insert("base_url".to_string(), self.base_url.clone());
            self.logger.log_error(&err.to_string(), &metadata);
        }
    }

    fn execute_inner(&mut self, handle: QueryHandle) -> Result<ResponseHandle> {
        let text = self.fetch_text(handle)?;
        let root = self.codec.parse(&text)?;
        let mut response = ResponseBuilder::new(&self.config.build).build(&root, 0, 0)?;
        self.map_properties(&mut response)?;
        response.set_source(text);
        self.log_built(&response);

        let qr = self.handles.create_response(response)?;
        self.handles
            .get_query_mut(handle)?
            .set_current_response(qr);
        Ok(qr)
    }

    /// Response from the query's most recent execution.
    pub fn query_response(&self, handle: QueryHandle) -> Result<ResponseHandle> {
        let result = self
            .handles
            .get_query(handle)
            .and_then(|q| q.current_response().ok_or(DalError::QueryNotExecuted));
        tracked(&self.errors, result)
    }

    /// Raw document text of the query's response.
    pub fn execute_document_text(&self, handle: QueryHandle) -> Result<String> {
        tracked(&self.errors, self.fetch_text(handle))
    }

    pub fn execute_delimited(&self, handle: QueryHandle, delimiter: Delimiter) -> Result<String> {
        let result = self
            .fetch_text(handle)
            .and_then(|text| self.codec.to_table(&text, 0, 0))
            .map(|table| table.render(delimiter));
        tracked(&self.errors, result)
    }

    pub fn execute_csv(&self, handle: QueryHandle) -> Result<String> {
        self.execute_delimited(handle, Delimiter::Comma)
    }

    pub fn execute_tsv(&self, handle: QueryHandle) -> Result<String> {
        self.execute_delimited(handle, Delimiter::Tab)
    }

    pub fn execute_ascii(&self, handle: QueryHandle) -> Result<String> {
        self.execute_delimited(handle, Delimiter::Space)
    }

    /// Saves the query's response to `path` without parsing it.
    pub fn access_data(&self, handle: QueryHandle, path: impl AsRef<Path>) -> Result<u64> {
        let result = self
            .handles
            .get_query(handle)
            .and_then(|q| q.query_url(&self.base_url))
            .and_then(|url| self.transport.get_to_file(&url, path.as_ref()));
        tracked(&self.errors, result)
    }

    fn fetch_text(&self, handle: QueryHandle) -> Result<String> {
        let url = self.handles.get_query(handle)?.query_url(&self.base_url)?;
        let started = Instant::now();
        let bytes = self.transport.get(&url)?;
        self.logger.log_fetch(&url, bytes.len(), started.elapsed());
        if bytes.is_empty() {
            return Err(DalError::ExecuteQuery(format!("empty response from {}", url)));
        }
        String::from_utf8(bytes)
            .map_err(|e| DalError::DocumentParse(format!("response is not UTF-8: {}", e)))
    }

    fn map_properties(&self, response: &mut QueryResponse) -> Result<()> {
        if let Some(mapper) = self.mappers.get(self.service) {
            debug!("Running '{}' property mapper", mapper.name());
            mapper.init_properties(&mut PropertyWriter::new(response), &self.version)?;
        }
        Ok(())
    }

    fn log_built(&self, response: &QueryResponse) {
        let mut metadata = HashMap::new();
        metadata.insert("rows".to_string(), response.record_count().to_string());
        metadata.insert("columns".to_string(), response.column_count().to_string());
        metadata.insert("fields".to_string(), response.field_count().to_string());
        metadata.insert("properties".to_string(), response.property_count().to_string());
        let level = if response.ragged_row_count() > 0 || response.truncated_attribute_count() > 0 {
            metadata.insert("ragged_rows".to_string(), response.ragged_row_count().to_string());
            metadata.insert(
                "truncated_attributes".to_string(),
                response.truncated_attribute_count().to_string(),
            );
            Level::Warn
        } else {
            Level::Debug
        };
        self.logger.log_build(level, &self.base_url, &metadata);
    }

    // ---- responses ----

    /// Builds a response from document text without fetching anything.
    pub fn init_query_response(&mut self, text: &str, resource: usize, table: usize) -> Result<ResponseHandle> {
        let result = self.parse_and_build(text, resource, table);
        let result = result.and_then(|response| self.handles.create_response(response));
        tracked(&self.errors, result)
    }

    fn parse_and_build(&self, text: &str, resource: usize, table: usize) -> Result<QueryResponse> {
        let root = self.codec.parse(text)?;
        let mut response = self.build_unregistered(&root, resource, table)?;
        response.set_source(text.to_string());
        Ok(response)
    }

    /// Builds a response from an already parsed document.
    pub fn build_query_response<N: VoNode>(
        &mut self,
        root: &N,
        resource: usize,
        table: usize,
    ) -> Result<ResponseHandle> {
        let result = self
            .build_unregistered(root, resource, table)
            .and_then(|response| self.handles.create_response(response));
        tracked(&self.errors, result)
    }

    fn build_unregistered<N: VoNode>(&self, root: &N, resource: usize, table: usize) -> Result<QueryResponse> {
        let mut response = ResponseBuilder::new(&self.config.build).build(root, resource, table)?;
        self.map_properties(&mut response)?;
        self.log_built(&response);
        Ok(response)
    }

    pub fn response(&self, handle: ResponseHandle) -> Result<&QueryResponse> {
        tracked(&self.errors, self.handles.get_response(handle))
    }

    /// Releases the response and any record handles pointing into it.
    pub fn close_query_response(&mut self, handle: ResponseHandle) -> Result<()> {
        let result = self.handles.remove_response(handle).map(|_| ());
        tracked(&self.errors, result)
    }

    pub fn export_delimited(&mut self, handle: ResponseHandle, delimiter: Delimiter) -> Result<String> {
        let codec = self.codec.as_ref();
        let result = self
            .handles
            .get_response_mut(handle)
            .and_then(|qr| qr.export_delimited(codec, delimiter));
        tracked(&self.errors, result)
    }

    pub fn release_source(&mut self, handle: ResponseHandle) -> Result<()> {
        let result = self
            .handles
            .get_response_mut(handle)
            .map(QueryResponse::release_source);
        tracked(&self.errors, result)
    }

    pub fn get_field_index(&self, handle: ResponseHandle, key: &str, attr: AttrCode) -> Result<usize> {
        let result = self
            .handles
            .get_response(handle)
            .and_then(|qr| qr.field_index(key, attr));
        tracked(&self.errors, result)
    }

    pub fn get_field_attr(&self, handle: ResponseHandle, index: i32, attr: AttrCode) -> Result<Option<&str>> {
        let result = self.handles.get_response(handle).and_then(|qr| {
            let index = non_negative(index).ok_or(DalError::FieldAccess(i64::from(index)))?;
            qr.field_attr(index, attr)
        });
        tracked(&self.errors, result)
    }

    pub fn get_info_attr(&self, handle: ResponseHandle, index: i32, attr: AttrCode) -> Result<Option<&str>> {
        let result = self.handles.get_response(handle).and_then(|qr| {
            let index = non_negative(index).ok_or(DalError::InfoNotFound(i64::from(index)))?;
            qr.info_attr(index, attr)
        });
        tracked(&self.errors, result)
    }

    pub fn get_prop_name(&self, handle: ResponseHandle, index: i32) -> Result<&str> {
        let result = self.handles.get_response(handle).and_then(|qr| {
            let index =
                non_negative(index).ok_or_else(|| DalError::PropertyNotFound(format!("#{}", index)))?;
            qr.property_name(index)
        });
        tracked(&self.errors, result)
    }

    pub fn get_int_column(&self, handle: ResponseHandle, index: i32, out: &mut [i64]) -> Result<usize> {
        let result = self
            .column_index(handle, index)
            .and_then(|(qr, index)| qr.int_column(index, out));
        tracked(&self.errors, result)
    }

    pub fn get_float_column(&self, handle: ResponseHandle, index: i32, out: &mut [f64]) -> Result<usize> {
        let result = self
            .column_index(handle, index)
            .and_then(|(qr, index)| qr.float_column(index, out));
        tracked(&self.errors, result)
    }

    pub fn get_string_column<'a>(
        &'a self,
        handle: ResponseHandle,
        index: i32,
        out: &mut [Option<&'a str>],
    ) -> Result<usize> {
        let result = self
            .column_index(handle, index)
            .and_then(|(qr, index)| qr.string_column(index, out));
        tracked(&self.errors, result)
    }

    fn column_index(&self, handle: ResponseHandle, index: i32) -> Result<(&QueryResponse, usize)> {
        let qr = self.handles.get_response(handle)?;
        let index = non_negative(index).ok_or(DalError::IndexOutOfBounds {
            index: i64::from(index),
            len: qr.field_count(),
        })?;
        Ok((qr, index))
    }

    // ---- records ----

    /// Record handle for row `recnum`; valid while the response is open.
    pub fn get_record(&mut self, handle: ResponseHandle, recnum: i32) -> Result<RecordHandle> {
        let result = self.record_ref(handle, recnum).and_then(|record| self.handles.create_record(record));
        tracked(&self.errors, result)
    }

    fn record_ref(&self, handle: ResponseHandle, recnum: i32) -> Result<RecordRef> {
        let qr = self.handles.get_response(handle)?;
        let row = non_negative(recnum)
            .filter(|&row| row < qr.record_count())
            .ok_or(DalError::RecordNotFound(i64::from(recnum)))?;
        Ok(RecordRef { response: handle, row })
    }

    /// Frees only the handle; the row stays in its response.
    pub fn release_record(&mut self, handle: RecordHandle) -> Result<()> {
        let result = self.handles.remove_record(handle);
        tracked(&self.errors, result)
    }

    pub fn record(&self, handle: RecordHandle) -> Result<Record<'_>> {
        tracked(&self.errors, self.resolve_record(handle))
    }

    fn resolve_record(&self, handle: RecordHandle) -> Result<Record<'_>> {
        let record = self.handles.get_record(handle)?;
        self.handles.get_response(record.response)?.record(record.row)
    }

    fn field_arg(&self, handle: RecordHandle, index: i32) -> Result<(Record<'_>, usize)> {
        let record = self.resolve_record(handle)?;
        let index = non_negative(index).ok_or(DalError::IndexOutOfBounds {
            index: i64::from(index),
            len: record.response().field_count(),
        })?;
        Ok((record, index))
    }

    pub fn get_int_field(&self, handle: RecordHandle, index: i32) -> Result<i64> {
        let result = self.field_arg(handle, index).and_then(|(r, i)| r.int_field(i));
        tracked(&self.errors, result)
    }

    pub fn get_float_field(&self, handle: RecordHandle, index: i32) -> Result<f64> {
        let result = self.field_arg(handle, index).and_then(|(r, i)| r.float_field(i));
        tracked(&self.errors, result)
    }

    pub fn get_string_field(&self, handle: RecordHandle, index: i32) -> Result<Option<&str>> {
        let result = self.field_arg(handle, index).and_then(|(r, i)| r.string_field(i));
        tracked(&self.errors, result)
    }

    pub fn get_int_property(&self, handle: RecordHandle, name: &str) -> Result<i64> {
        let result = self.resolve_record(handle).and_then(|r| r.int_property(name));
        tracked(&self.errors, result)
    }

    pub fn get_float_property(&self, handle: RecordHandle, name: &str) -> Result<f64> {
        let result = self.resolve_record(handle).and_then(|r| r.float_property(name));
        tracked(&self.errors, result)
    }

    pub fn get_string_property(&self, handle: RecordHandle, name: &str) -> Result<Option<&str>> {
        let result = self.resolve_record(handle).and_then(|r| r.string_property(name));
        tracked(&self.errors, result)
    }

    /// Downloads the dataset at `acref` (typically the record's `acref`
    /// property) to `path`. The reference is passed to the transport as is.
    pub fn get_dataset(&self, handle: RecordHandle, acref: &str, path: impl AsRef<Path>) -> Result<u64> {
        let result = self
            .resolve_record(handle)
            .and_then(|_| self.transport.get_to_file(acref, path.as_ref()));
        if let Err(err) = &result {
            self.log_failure(err, "dataset");
        }
        tracked(&self.errors, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::UnavailableTransport;

    fn connection(protocol: &str) -> DalConnection {
        DalConnection::open_with(
            "http://example.org/svc",
            protocol,
            "1.0",
            ClientConfig::default(),
            Box::new(UnavailableTransport),
        )
        .unwrap()
    }

    #[test]
    fn test_open_validation() {
        let open = |url: &str, protocol: &str, version: &str| {
            DalConnection::open_with(
                url,
                protocol,
                version,
                ClientConfig::default(),
                Box::new(UnavailableTransport),
            )
        };
        assert!(matches!(open("http://h", "", "1.0"), Err(DalError::NoProtocol)));
        assert!(matches!(open("http://h", "scs", ""), Err(DalError::NoVersion)));
        assert!(matches!(open(" ", "scs", "1.0"), Err(DalError::NoBaseUrl)));
    }

    #[test]
    fn test_service_type() {
        assert_eq!(connection("SCS").service_type(), ServiceType::Cone);
        assert_eq!(connection("ssap").service_type(), ServiceType::Spectrum);
        assert_eq!(connection("tap").service_type(), ServiceType::Generic);
    }

    #[test]
    fn test_error_slot_posted_and_cleared() {
        let mut conn = connection("scs");
        let q = conn.new_query().unwrap();
        assert_eq!(conn.error_code(), crate::error::DAL_OK);

        assert!(conn.query_response(q).is_err());
        assert_eq!(conn.error_code(), 123);
        assert!(conn.error_message().is_some());

        conn.clear_error();
        assert_eq!(conn.error_code(), crate::error::DAL_OK);

        // transport failure surfaces unchanged
        assert!(matches!(conn.execute_query(q), Err(DalError::Transport(_))));
        assert_eq!(conn.last_error().map(|e| e.code), Some(152));
    }

    #[test]
    fn test_closed_query_handle_is_stale() {
        let mut conn = connection("scs");
        let q = conn.cone_query(1.0, 2.0, 0.5).unwrap();
        assert_eq!(
            conn.query_url(q).unwrap(),
            "http://example.org/svc?RA=1&DEC=2&SR=0.5"
        );
        conn.close_query(q).unwrap();
        assert!(matches!(conn.query_url(q), Err(DalError::BadHandle(_))));
        assert_eq!(conn.error_code(), 100);
    }

    #[test]
    fn test_set_base_url() {
        let mut conn = connection("scs");
        assert!(matches!(conn.set_base_url(""), Err(DalError::NoBaseUrl)));
        conn.set_base_url("http://other.org/cone?").unwrap();
        assert_eq!(conn.base_url(), "http://other.org/cone?");
    }
}
