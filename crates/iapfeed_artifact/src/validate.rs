//! Document validation: a built-in structural check and optional `xmllint`.

use std::path::Path;
use std::process::Command;

use iapfeed_common::{InclusionReason, Subnet};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ArtifactError;

/// Optional `<attributes>` children after `type`, `name` and `ipaddress`.
const OPTIONAL_ATTRIBUTES: &[&str] = &[
    "port",
    "dtcp_version",
    "list_flags",
    "source_interface",
    "li_source",
    "quirks",
];

/// Counts gathered while validating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationSummary {
    /// Number of `<iap>` elements.
    pub iaps: usize,
    /// Number of `<network>` elements.
    pub networks: usize,
}

#[derive(Debug, Default)]
struct Node {
    name: String,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn child_names(&self) -> Vec<&str> {
        self.children.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Re-parses a document and checks the `iaps` structure.
///
/// Checks element order, numeric type codes and group ids, parseable
/// loopback addresses and parseable network CIDRs.
pub fn validate_structure(xml: &str) -> Result<ValidationSummary, ArtifactError> {
    let root = parse_tree(xml)?;
    if root.name != "iaps" {
        return Err(structure(format!("root element is <{}>, expected <iaps>", root.name)));
    }

    let mut summary = ValidationSummary::default();
    for (position, iap) in root.children.iter().enumerate() {
        if iap.name != "iap" {
            return Err(structure(format!("unexpected <{}> under <iaps>", iap.name)));
        }
        check_iap(iap).map_err(|reason| structure(format!("iap #{}: {reason}", position + 1)))?;
        summary.iaps += 1;
        summary.networks += iap.children[2].children.len();
    }
    Ok(summary)
}

fn check_iap(iap: &Node) -> Result<(), String> {
    if iap.child_names() != ["attributes", "groups", "networks"] {
        return Err(format!(
            "children are {:?}, expected attributes, groups, networks",
            iap.child_names()
        ));
    }
    let attributes = &iap.children[0];
    let names = attributes.child_names();
    if names.len() < 3 || names[..3] != ["type", "name", "ipaddress"] {
        return Err("attributes must start with type, name, ipaddress".to_string());
    }
    if let Some(extra) = names[3..].iter().find(|n| !OPTIONAL_ATTRIBUTES.contains(*n)) {
        return Err(format!("unexpected attribute <{extra}>"));
    }
    let code = &attributes.children[0].text;
    if code.parse::<u32>().is_err() {
        return Err(format!("type '{code}' is not numeric"));
    }
    if attributes.children[1].text.trim().is_empty() {
        return Err("empty name".to_string());
    }
    let address = &attributes.children[2].text;
    if address.parse::<std::net::IpAddr>().is_err() {
        return Err(format!("ipaddress '{address}' is not an address"));
    }

    for group in &iap.children[1].children {
        if group.name != "group" || group.text.parse::<u32>().is_err() {
            return Err(format!("bad group <{}>{}", group.name, group.text));
        }
    }

    for network in &iap.children[2].children {
        if network.name != "network" {
            return Err(format!("unexpected <{}> under <networks>", network.name));
        }
        let names = network.child_names();
        if names != ["address"] && names != ["address", "attributes"] {
            return Err(format!("network children are {names:?}"));
        }
        let cidr = &network.children[0].text;
        if !cidr.contains('/') || Subnet::parse(cidr, "", InclusionReason::Inventory).is_err() {
            return Err(format!("network address '{cidr}' is not a CIDR"));
        }
        if let Some(attrs) = network.children.get(1) {
            if attrs.child_names() != ["ingress_index", "egress_index"] {
                return Err(format!("network attributes are {:?}", attrs.child_names()));
            }
        }
    }
    Ok(())
}

fn parse_tree(xml: &str) -> Result<Node, ArtifactError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;
    loop {
        let event = reader.read_event().map_err(|e| ArtifactError::Xml {
            reason: format!("at byte {}: {e}", reader.buffer_position()),
        })?;
        match event {
            Event::Start(start) => stack.push(Node {
                name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
                ..Node::default()
            }),
            Event::Empty(empty) => {
                let node = Node {
                    name: String::from_utf8_lossy(empty.name().as_ref()).into_owned(),
                    ..Node::default()
                };
                attach(&mut stack, &mut root, node)?;
            }
            Event::Text(text) => {
                let value = text.unescape().map_err(|e| ArtifactError::Xml {
                    reason: e.to_string(),
                })?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&value);
                }
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| structure("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if !stack.is_empty() {
        return Err(structure("unclosed elements at end of document".to_string()));
    }
    root.ok_or_else(|| structure("empty document".to_string()))
}

fn attach(stack: &mut [Node], root: &mut Option<Node>, node: Node) -> Result<(), ArtifactError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => return Err(structure("more than one root element".to_string())),
    }
    Ok(())
}

fn structure(reason: String) -> ArtifactError {
    ArtifactError::Structure { reason }
}

/// Validates a written file against an XSD with `xmllint --schema <xsd> --noout`.
///
/// Blocking; run it off the async executor.
pub fn run_xmllint(xmllint: &str, schema: &Path, file: &Path) -> Result<(), ArtifactError> {
    let output = Command::new(xmllint)
        .arg("--schema")
        .arg(schema)
        .arg("--noout")
        .arg(file)
        .output()
        .map_err(|source| ArtifactError::Tool {
            tool: xmllint.to_string(),
            source,
        })?;
    if output.status.success() {
        tracing::info!(file = %file.display(), "schema validation passed");
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(ArtifactError::Schema {
            schema: schema.to_path_buf(),
            output: stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<iaps>
    <iap>
        <attributes>
            <type>65</type>
            <name>PE-N-01</name>
            <ipaddress>10.1.2.3</ipaddress>
            <port>830</port>
            <li_source>LI_MIRROR</li_source>
        </attributes>
        <groups>
            <group>3</group>
        </groups>
        <networks>
            <network>
                <address>2001:db8::/32</address>
                <attributes>
                    <ingress_index>1</ingress_index>
                    <egress_index>1</egress_index>
                </attributes>
            </network>
        </networks>
    </iap>
</iaps>
"#;

    #[test]
    fn valid_document() {
        let summary = validate_structure(VALID).unwrap();
        assert_eq!(summary, ValidationSummary { iaps: 1, networks: 1 });
    }

    #[test]
    fn wrong_root() {
        let err = validate_structure("<devices/>").unwrap_err();
        assert!(err.to_string().contains("<devices>"));
    }

    #[test]
    fn non_numeric_type() {
        let xml = VALID.replace("<type>65</type>", "<type>sros</type>");
        let err = validate_structure(&xml).unwrap_err();
        assert!(err.to_string().contains("not numeric"));
    }

    #[test]
    fn attribute_order_enforced() {
        let xml = VALID.replace(
            "<type>65</type>\n            <name>PE-N-01</name>",
            "<name>PE-N-01</name>\n            <type>65</type>",
        );
        assert!(validate_structure(&xml).is_err());
    }

    #[test]
    fn bad_address() {
        let xml = VALID.replace("<ipaddress>10.1.2.3</ipaddress>", "<ipaddress>nope</ipaddress>");
        assert!(validate_structure(&xml).is_err());
        let xml = VALID.replace("2001:db8::/32", "2001:db8::");
        assert!(validate_structure(&xml).is_err());
    }

    #[test]
    fn unknown_attribute() {
        let xml = VALID.replace("<port>830</port>", "<colour>red</colour>");
        let err = validate_structure(&xml).unwrap_err();
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn malformed_xml() {
        let err = validate_structure("<iaps><iap></iaps>").unwrap_err();
        assert!(matches!(err, ArtifactError::Xml { .. } | ArtifactError::Structure { .. }));
    }

    #[test]
    fn empty_networks_element() {
        let xml = "<iaps><iap><attributes><type>1</type><name>A</name>\
                   <ipaddress>10.0.0.1</ipaddress></attributes><groups/><networks/></iap></iaps>";
        let summary = validate_structure(xml).unwrap();
        assert_eq!(summary.networks, 0);
    }

    #[test]
    fn missing_xmllint_is_a_tool_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_xmllint(
            "definitely-not-an-xmllint-binary",
            &dir.path().join("s.xsd"),
            &dir.path().join("f.xml"),
        )
        .unwrap_err();
        assert!(matches!(err, ArtifactError::Tool { .. }));
    }
}
