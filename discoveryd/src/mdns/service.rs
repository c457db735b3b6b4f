use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use mdns_sd::ServiceInfo;
use ad_listeners::{ContainerPort, Service, ServiceError, ServiceId};
use super::LISTENER_NAME;

/// A service resolved over mDNS / DNS-SD.
#[derive(Debug, Clone, PartialEq)]
pub struct MdnsService {
    id: ServiceId,
    /// Service type, e.g. "_http._tcp.local."
    service_type: String,
    /// Hostname, e.g. "nas.local."
    hostname: String,
    /// Sorted, IPv4 before IPv6
    addresses: Vec<IpAddr>,
    port: u16,
    txt: BTreeMap<String, String>,
}

impl MdnsService {
    /// Convert a resolved mdns-sd ServiceInfo. Returns None when no usable
    /// address is left after filtering.
    pub fn from_info(info: &ServiceInfo, ipv6_only: bool) -> Option<Self> {
        let mut addresses: Vec<IpAddr> = info
            .get_addresses()
            .iter()
            .copied()
            .filter(|addr| !ipv6_only || addr.is_ipv6())
            .collect();

        if addresses.is_empty() {
            tracing::debug!("Skipping service {} - no usable addresses", info.get_fullname());
            return None;
        }
        addresses.sort();

        let txt = info
            .get_properties()
            .iter()
            .map(|prop| (prop.key().to_string(), prop.val_str().to_string()))
            .collect();

        Some(Self {
            id: ServiceId::scoped(LISTENER_NAME, info.get_fullname()),
            service_type: info.get_type().to_string(),
            hostname: info.get_hostname().to_string(),
            addresses,
            port: info.get_port(),
            txt,
        })
    }

    /// "_http._tcp.local." -> "_http._tcp"
    fn short_type(&self) -> &str {
        self.service_type
            .trim_end_matches('.')
            .trim_end_matches(".local")
    }
}

impl Service for MdnsService {
    fn id(&self) -> &ServiceId {
        &self.id
    }

    fn ad_identifiers(&self) -> Result<Vec<String>, ServiceError> {
        Ok(vec![self.short_type().to_string()])
    }

    fn hosts(&self) -> Result<HashMap<String, String>, ServiceError> {
        let mut hosts = HashMap::new();
        if let Some(v4) = self.addresses.iter().find(|addr| addr.is_ipv4()) {
            hosts.insert("ipv4".to_string(), v4.to_string());
        }
        if let Some(v6) = self.addresses.iter().find(|addr| addr.is_ipv6()) {
            hosts.insert("ipv6".to_string(), v6.to_string());
        }
        Ok(hosts)
    }

    fn ports(&self) -> Result<Vec<ContainerPort>, ServiceError> {
        // "_http._tcp" names the port "http"
        let name = self
            .short_type()
            .split('.')
            .next()
            .unwrap_or_default()
            .trim_start_matches('_');
        Ok(vec![ContainerPort::new(self.port, name)])
    }

    fn tags(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self
            .txt
            .iter()
            .map(|(key, value)| {
                if value.is_empty() {
                    key.clone()
                } else {
                    format!("{}:{}", key, value)
                }
            })
            .collect())
    }

    fn pid(&self) -> Result<u32, ServiceError> {
        Err(ServiceError::NotSupported)
    }

    fn hostname(&self) -> Result<String, ServiceError> {
        Ok(self.hostname.trim_end_matches('.').to_string())
    }
}
