use crate::collections::{CaseInsensitiveMultiIndex, OrderedList};
use crate::error::{DalError, Result};
use crate::handles::ResponseHandle;
use crate::protocol::format_float_g15;
use url::form_urlencoded;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    pub name: String,
    pub value: String,
}

/// Ordered query parameters. A name may carry several values; each is
/// emitted as its own `name=value` pair, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Query {
    params: OrderedList<QueryParam>,
    names: CaseInsensitiveMultiIndex,
    current: Option<ResponseHandle>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simple Cone Search: `RA`, `DEC`, `SR` in decimal degrees.
    pub fn cone(ra: f64, dec: f64, sr: f64) -> Self {
        let mut query = Self::new();
        query.add_float_param("RA", ra);
        query.add_float_param("DEC", dec);
        query.add_float_param("SR", sr);
        query
    }

    /// Simple Image Access. Version 2 services also get `REQUEST=queryData`.
    pub fn image(version: &str, ra: f64, dec: f64, ra_size: f64, dec_size: f64, format: Option<&str>) -> Self {
        let mut query = Self::new();
        if version.starts_with('2') {
            query.add_string_param("REQUEST", "queryData");
        }
        query.add_string_param("POS", &format_position(ra, dec));
        let size = if (ra_size - dec_size).abs() <= f64::from(f32::EPSILON) {
            format!("{:.3}", ra_size)
        } else {
            format!("{:.3},{:.3}", ra_size, dec_size)
        };
        query.add_string_param("SIZE", &size);
        if let Some(format) = format.filter(|f| !f.is_empty()) {
            query.add_string_param("FORMAT", format);
        }
        query
    }

    /// Simple Spectral Access. Empty band/time/format are omitted.
    pub fn spectrum(ra: f64, dec: f64, size: f64, band: Option<&str>, time: Option<&str>, format: Option<&str>) -> Self {
        let mut query = Self::new();
        query.add_string_param("REQUEST", "queryData");
        query.add_string_param("POS", &format_position(ra, dec));
        query.add_string_param("SIZE", &format!("{:.3}", size));
        for (name, value) in [("BAND", band), ("TIME", time), ("FORMAT", format)] {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                query.add_string_param(name, value);
            }
        }
        query
    }

    pub fn add_string_param(&mut self, name: &str, value: &str) {
        let position = self.params.append(QueryParam {
            name: name.to_string(),
            value: value.to_string(),
        });
        self.names.insert(name, position);
    }

    pub fn add_int_param(&mut self, name: &str, value: i64) {
        self.add_string_param(name, &value.to_string());
    }

    /// Float values are written with 15 significant digits.
    pub fn add_float_param(&mut self, name: &str, value: f64) {
        self.add_string_param(name, &format_float_g15(value));
    }

    /// Collapses `name` to a single instance holding `value`, adding it if
    /// absent. The surviving instance keeps its original position.
    pub fn set_param(&mut self, name: &str, value: &str) {
        let positions = self.names.find_all(name).to_vec();
        let Some((&first, rest)) = positions.split_first() else {
            self.add_string_param(name, value);
            return;
        };
        if let Some(param) = self.params.get_mut(first) {
            param.value = value.to_string();
        }
        if !rest.is_empty() {
            for &position in rest.iter().rev() {
                self.params.remove(position);
            }
            self.rebuild_index();
        }
    }

    /// Value of instance `instance` of `name`. An unknown name fails;
    /// an instance past the last one is `None`.
    pub fn get_param(&self, name: &str, instance: usize) -> Result<Option<&str>> {
        let positions = self.names.find_all(name);
        if positions.is_empty() {
            return Err(DalError::ParamNotFound(name.to_string()));
        }
        Ok(positions
            .get(instance)
            .and_then(|&p| self.params.get(p))
            .map(|p| p.value.as_str()))
    }

    /// Removes every instance of `name`; returns how many were removed.
    pub fn del_param(&mut self, name: &str) -> usize {
        let removed = self.names.find_all(name).len();
        if removed > 0 {
            self.params.retain(|p| !p.name.eq_ignore_ascii_case(name));
            self.rebuild_index();
        }
        removed
    }

    fn rebuild_index(&mut self) {
        self.names.clear();
        for (position, param) in self.params.iter().enumerate() {
            self.names.insert(&param.name, position);
        }
    }

    /// Number of parameter instances.
    pub fn param_count(&self) -> usize {
        self.params.count()
    }

    pub fn param_name(&self, index: usize) -> Result<&str> {
        self.params
            .get(index)
            .map(|p| p.name.as_str())
            .ok_or_else(|| DalError::ParamNotFound(format!("#{}", index)))
    }

    pub fn params(&self) -> impl Iterator<Item = &QueryParam> {
        self.params.iter()
    }

    /// `base_url` followed by the form-encoded parameters, joined with
    /// `&` when the base URL already carries a query string.
    pub fn query_url(&self, base_url: &str) -> Result<String> {
        let base = base_url.trim();
        if base.is_empty() {
            return Err(DalError::FormQueryUrl("service base URL is empty".to_string()));
        }
        let mut url = base.to_string();
        if self.params.is_empty() {
            return Ok(url);
        }

        let encoded = {
            let mut serializer = form_urlencoded::Serializer::new(String::new());
            self.params.rewind();
            while let Some(param) = self.params.next() {
                serializer.append_pair(&param.name, &param.value);
            }
            serializer.finish()
        };
        match url.find('?') {
            Some(q) if q + 1 == url.len() || url.ends_with('&') => {}
            Some(_) => url.push('&'),
            None => url.push('?'),
        }
        url.push_str(&encoded);
        Ok(url)
    }

    /// Response produced by the most recent execution.
    pub fn current_response(&self) -> Option<ResponseHandle> {
        self.current
    }

    pub(crate) fn set_current_response(&mut self, handle: ResponseHandle) {
        self.current = Some(handle);
    }
}

fn format_position(ra: f64, dec: f64) -> String {
    format!("{:.3},{:.3}", ra, dec)
}
