use std::fmt::Write;

use serde::{Deserialize, Serialize};

/// A named party on the declaration (shipper or consignee).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub country: String,
}

/// One line of declared goods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoodsLine {
    pub description: String,
    /// Classification code as declared (may contain dots, spaces, dashes).
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub unit_value: f64,
    #[serde(default)]
    pub total_value: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub country_of_origin: String,
}

/// A structured trade declaration. Immutable for the duration of one
/// analysis run; workers only ever see a shared snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    #[serde(default)]
    pub declaration_id: Option<String>,
    pub shipper: Party,
    pub consignee: Party,
    #[serde(default)]
    pub goods: Vec<GoodsLine>,
    #[serde(default)]
    pub country_of_dispatch: String,
    #[serde(default)]
    pub destination_country: String,
    #[serde(default)]
    pub port_of_entry: String,
    #[serde(default)]
    pub total_value: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub transport_mode: String,
}

impl Declaration {
    /// A declaration with no parties and no goods carries nothing to
    /// analyze; dispatch refuses it up front.
    pub fn is_empty(&self) -> bool {
        self.shipper.name.trim().is_empty()
            && self.consignee.name.trim().is_empty()
            && self.goods.is_empty()
    }

    /// Render the declaration as the plain-text analysis prompt handed to
    /// model-backed workers. Deterministic field order.
    pub fn to_prompt(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Analyze this customs declaration for compliance issues:");
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Shipper: {} ({})",
            value_or_na(&self.shipper.name),
            value_or_na(&self.shipper.country)
        );
        let _ = writeln!(out, "Shipper Address: {}", value_or_na(&self.shipper.address));
        let _ = writeln!(
            out,
            "Consignee: {} ({})",
            value_or_na(&self.consignee.name),
            value_or_na(&self.consignee.country)
        );
        if !self.goods.is_empty() {
            let _ = writeln!(out, "\nGoods:");
            for (idx, line) in self.goods.iter().enumerate() {
                let _ = writeln!(out, "  {}. {}", idx + 1, value_or_na(&line.description));
                let _ = writeln!(out, "     Code: {}", value_or_na(&line.code));
                let _ = writeln!(
                    out,
                    "     Value: {} x {} = {} {}",
                    line.unit_value, line.quantity, line.total_value, line.currency
                );
                let _ = writeln!(out, "     Origin: {}", value_or_na(&line.country_of_origin));
            }
        }
        let _ = writeln!(out, "\nCountry of Dispatch: {}", value_or_na(&self.country_of_dispatch));
        let destination = if self.destination_country.trim().is_empty() {
            &self.port_of_entry
        } else {
            &self.destination_country
        };
        let _ = writeln!(out, "Destination: {}", value_or_na(destination));
        let _ = writeln!(out, "Total Value: {} {}", self.total_value, self.currency);
        let _ = writeln!(out, "Transport Mode: {}", value_or_na(&self.transport_mode));
        let _ = writeln!(out);
        let _ = writeln!(out, "Provide your analysis as JSON:");
        let _ = writeln!(
            out,
            r#"{{"findings": [{{"code": "...", "title": "...", "description": "...", "severity": "low|medium|high|critical", "confidence": "low|medium|high", "evidence": [...]}}]}}"#
        );
        out
    }
}

fn value_or_na(value: &str) -> &str {
    if value.trim().is_empty() {
        "N/A"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Declaration {
        Declaration {
            declaration_id: Some("DEMO-001".into()),
            shipper: Party {
                name: "Shenzhen Electronics Co., Ltd.".into(),
                address: "123 Factory Road, Shenzhen".into(),
                country: "CN".into(),
            },
            consignee: Party {
                name: "UK Import Ltd.".into(),
                address: "45 Commerce Street, London".into(),
                country: "GB".into(),
            },
            goods: vec![GoodsLine {
                description: "LED Computer Monitors, 27 inch".into(),
                code: "852852".into(),
                quantity: 50.0,
                unit_value: 300.0,
                total_value: 15000.0,
                currency: "USD".into(),
                country_of_origin: "CN".into(),
            }],
            country_of_dispatch: "CN".into(),
            destination_country: "GB".into(),
            port_of_entry: "Felixstowe".into(),
            total_value: 15000.0,
            currency: "USD".into(),
            transport_mode: "Sea".into(),
        }
    }

    #[test]
    fn default_declaration_is_empty() {
        assert!(Declaration::default().is_empty());
    }

    #[test]
    fn declaration_with_only_shipper_is_not_empty() {
        let declaration = Declaration {
            shipper: Party {
                name: "Acme".into(),
                ..Party::default()
            },
            ..Declaration::default()
        };
        assert!(!declaration.is_empty());
    }

    #[test]
    fn prompt_includes_parties_goods_and_routing() {
        let prompt = sample().to_prompt();
        assert!(prompt.contains("Shipper: Shenzhen Electronics Co., Ltd. (CN)"));
        assert!(prompt.contains("Consignee: UK Import Ltd. (GB)"));
        assert!(prompt.contains("Code: 852852"));
        assert!(prompt.contains("Destination: GB"));
        assert!(prompt.contains("\"findings\""));
    }

    #[test]
    fn prompt_falls_back_to_port_of_entry() {
        let mut declaration = sample();
        declaration.destination_country = String::new();
        let prompt = declaration.to_prompt();
        assert!(prompt.contains("Destination: Felixstowe"));
    }

    #[test]
    fn prompt_marks_missing_fields() {
        let declaration = Declaration {
            shipper: Party {
                name: "Acme".into(),
                ..Party::default()
            },
            ..Declaration::default()
        };
        assert!(declaration.to_prompt().contains("Shipper: Acme (N/A)"));
    }

    #[test]
    fn deserializes_from_snake_case_json() {
        let raw = r#"{
            "shipper": {"name": "A", "country": "CN"},
            "consignee": {"name": "B", "country": "GB"},
            "goods": [{"description": "widgets", "code": "8518.30", "quantity": 2}],
            "country_of_dispatch": "CN",
            "total_value": 12.5
        }"#;
        let declaration: Declaration = serde_json::from_str(raw).unwrap();
        assert_eq!(declaration.goods.len(), 1);
        assert_eq!(declaration.goods[0].code, "8518.30");
        assert!((declaration.total_value - 12.5).abs() < f64::EPSILON);
    }
}
