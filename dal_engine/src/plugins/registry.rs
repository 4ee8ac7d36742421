use super::property_mapper::PropertyMapper;
use crate::protocol::ServiceType;
use std::collections::HashMap;
use std::sync::Arc;

pub struct PluginRegistry {
    mappers: HashMap<ServiceType, Arc<dyn PropertyMapper>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            mappers: HashMap::new(),
        }
    }

    /// Registers `mapper` for its service type, replacing any previous one.
    pub fn register(&mut self, mapper: Arc<dyn PropertyMapper>) {
        self.mappers.insert(mapper.service_type(), mapper);
    }

    pub fn get(&self, service: ServiceType) -> Option<Arc<dyn PropertyMapper>> {
        self.mappers.get(&service).cloned()
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::cone::ConeMapper::new()));
        registry.register(Arc::new(super::image::ImageMapper::new()));
        registry.register(Arc::new(super::spectrum::SpectrumMapper::new()));
        registry
    }
}
