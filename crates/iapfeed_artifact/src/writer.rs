//! Rendering of the `iaps` document.

use iapfeed_common::{AddressFamily, Subnet, Vendor};
use iapfeed_config::{JuniperConfig, NokiaConfig};
use iapfeed_reconcile::ReconciledDevice;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::codes::{quirks, type_code};
use crate::error::ArtifactError;

/// Ingress/egress index pairs written per Nokia network entry.
const NOKIA_V4_INDEXES: &[(&str, &str)] = &[("1", "1")];
const NOKIA_V6_INDEXES: &[(&str, &str)] = &[("1", "1"), ("2", "1")];

/// What the builder writes besides the device data.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Group ids written into every `<iap>`.
    pub xml_groups: Vec<u32>,
    /// Juniper DTCP attributes.
    pub juniper: JuniperConfig,
    /// Nokia attributes.
    pub nokia: NokiaConfig,
}

/// A device left out of the document because it could not be serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedDevice {
    /// Device name.
    pub name: String,
    /// Why it was rejected.
    pub reason: String,
}

/// A rendered document and what went into it.
#[derive(Debug, Clone, Default)]
pub struct BuiltDocument {
    /// The XML text, ending with a newline.
    pub xml: String,
    /// Names of the serialized devices, in document order.
    pub included: Vec<String>,
    /// Devices skipped for lack of a loopback.
    pub skipped_no_loopback: Vec<String>,
    /// Devices rejected with a per-device error.
    pub rejected: Vec<RejectedDevice>,
}

/// Renders reconciled devices into the `iaps` XML dialect.
#[derive(Debug, Clone, Default)]
pub struct ArtifactBuilder {
    options: BuildOptions,
}

type XmlWriter = Writer<Vec<u8>>;

impl ArtifactBuilder {
    /// Creates a builder.
    pub fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    /// Renders the document.
    ///
    /// Devices are written in name order; subnets in the order given.
    /// Devices without a loopback are skipped and devices with an unmapped
    /// platform rejected; both are reported, and the rest still serialize.
    /// Returns [`ArtifactError::Empty`] when nothing is left to write.
    pub fn build(&self, devices: &[ReconciledDevice]) -> Result<BuiltDocument, ArtifactError> {
        let mut ordered: Vec<&ReconciledDevice> = devices.iter().collect();
        ordered.sort_by(|a, b| a.device.name.cmp(&b.device.name));

        let mut doc = BuiltDocument::default();
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_err)?;
        start(&mut writer, "iaps")?;

        for entry in ordered {
            let device = &entry.device;
            let Some(loopback) = &device.loopback else {
                tracing::warn!(device = %device.name, "skipping device without loopback");
                doc.skipped_no_loopback.push(device.name.clone());
                continue;
            };
            let code = match type_code(&device.name, &device.vendor) {
                Ok(code) => code,
                Err(e) => {
                    tracing::error!(device = %device.name, error = %e, "rejecting device");
                    doc.rejected.push(RejectedDevice {
                        name: device.name.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            start(&mut writer, "iap")?;

            start(&mut writer, "attributes")?;
            leaf(&mut writer, "type", &code.to_string())?;
            leaf(&mut writer, "name", &device.name)?;
            leaf(&mut writer, "ipaddress", &loopback.address.to_string())?;
            self.write_vendor_fields(&mut writer, &device.vendor, &loopback.name)?;
            let tokens = quirks(device);
            if !tokens.is_empty() {
                leaf(&mut writer, "quirks", &tokens.join(","))?;
            }
            end(&mut writer, "attributes")?;

            start(&mut writer, "groups")?;
            for group in &self.options.xml_groups {
                leaf(&mut writer, "group", &group.to_string())?;
            }
            end(&mut writer, "groups")?;

            self.write_networks(&mut writer, &device.vendor, &entry.subnets)?;

            end(&mut writer, "iap")?;
            doc.included.push(device.name.clone());
        }

        end(&mut writer, "iaps")?;

        if doc.included.is_empty() {
            return Err(ArtifactError::Empty);
        }

        let mut xml = String::from_utf8(writer.into_inner()).map_err(|e| ArtifactError::Xml {
            reason: e.to_string(),
        })?;
        xml.push('\n');
        doc.xml = xml;
        tracing::info!(
            devices = doc.included.len(),
            skipped = doc.skipped_no_loopback.len(),
            rejected = doc.rejected.len(),
            "rendered document"
        );
        Ok(doc)
    }

    fn write_vendor_fields(
        &self,
        writer: &mut XmlWriter,
        vendor: &Vendor,
        loopback_name: &str,
    ) -> Result<(), ArtifactError> {
        match vendor {
            Vendor::Juniper => {
                let juniper = &self.options.juniper;
                if let Some(port) = juniper.port {
                    leaf(writer, "port", &port.to_string())?;
                }
                if let Some(version) = &juniper.dtcp_version {
                    leaf(writer, "dtcp_version", version)?;
                }
                if let Some(flags) = &juniper.list_flags {
                    leaf(writer, "list_flags", flags)?;
                }
            }
            Vendor::CiscoIosXr => leaf(writer, "source_interface", loopback_name)?,
            Vendor::NokiaSrosMd => {
                leaf(writer, "port", &self.options.nokia.port.to_string())?;
                leaf(writer, "li_source", &self.options.nokia.li_source)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn write_networks(
        &self,
        writer: &mut XmlWriter,
        vendor: &Vendor,
        subnets: &[Subnet],
    ) -> Result<(), ArtifactError> {
        if subnets.is_empty() {
            return writer
                .write_event(Event::Empty(BytesStart::new("networks")))
                .map(|_| ())
                .map_err(xml_err);
        }
        start(writer, "networks")?;
        for subnet in subnets {
            let cidr = subnet.cidr();
            if *vendor == Vendor::NokiaSrosMd {
                let indexes = match subnet.family() {
                    AddressFamily::V4 => NOKIA_V4_INDEXES,
                    AddressFamily::V6 => NOKIA_V6_INDEXES,
                };
                for (ingress, egress) in indexes {
                    start(writer, "network")?;
                    leaf(writer, "address", &cidr)?;
                    start(writer, "attributes")?;
                    leaf(writer, "ingress_index", ingress)?;
                    leaf(writer, "egress_index", egress)?;
                    end(writer, "attributes")?;
                    end(writer, "network")?;
                }
            } else {
                start(writer, "network")?;
                leaf(writer, "address", &cidr)?;
                end(writer, "network")?;
            }
        }
        end(writer, "networks")
    }
}

fn xml_err(e: impl std::fmt::Display) -> ArtifactError {
    ArtifactError::Xml {
        reason: e.to_string(),
    }
}

fn start(writer: &mut XmlWriter, name: &str) -> Result<(), ArtifactError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map(|_| ())
        .map_err(xml_err)
}

fn end(writer: &mut XmlWriter, name: &str) -> Result<(), ArtifactError> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map(|_| ())
        .map_err(xml_err)
}

fn leaf(writer: &mut XmlWriter, name: &str, text: &str) -> Result<(), ArtifactError> {
    start(writer, name)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map(|_| ())
        .map_err(xml_err)?;
    end(writer, name)
}
