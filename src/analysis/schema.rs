//! Declarative field tables for every section kind.
//!
//! A [`FieldSpec`] names one canonical field, the historical spellings it
//! has appeared under, its type and what to do when a file does not carry
//! it. The built-in tables cover the report dialects produced by the
//! scenario runners; [`ReportSchema`] lets callers extend them.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use super::scalar::{coerce, is_na_token, Scalar, TypeTag};
use super::stats::percent;
use super::types::{FieldSource, SectionKind, SectionName};

/// Computes a missing field from the other fields of the same record/section.
pub type DeriveFn = fn(&dyn FieldSource) -> Scalar;

/// What to do when a section does not carry a field at all.
#[derive(Debug, Clone)]
pub enum MissingPolicy {
    UseDefault(Scalar),
    Derive(DeriveFn),
    Null,
}

/// What to do with keys/columns that match no registered alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFieldPolicy {
    /// Keep the key verbatim with an untyped value.
    #[default]
    PassThrough,
    /// Discard the key.
    Drop,
}

impl FromStr for UnknownFieldPolicy {
    type Err = String;

    /// Accepts the config spellings (`pass_through`, `drop`) and the
    /// kebab-case CLI form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pass_through" => Ok(UnknownFieldPolicy::PassThrough),
            "drop" => Ok(UnknownFieldPolicy::Drop),
            other => Err(format!(
                "unknown field policy '{}' (expected pass_through or drop)",
                other
            )),
        }
    }
}

/// Static metadata for one canonical field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    /// Accepted spellings, highest priority first.
    pub aliases: Vec<String>,
    pub ty: TypeTag,
    pub nullable: bool,
    pub on_missing: MissingPolicy,
}

impl FieldSpec {
    /// A field accepted only under its canonical name.
    pub fn new(name: &str, ty: TypeTag) -> Self {
        Self {
            name: name.to_string(),
            aliases: vec![name.to_string()],
            ty,
            nullable: false,
            on_missing: MissingPolicy::Null,
        }
    }

    /// Replace the accepted spellings.
    pub fn aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn default_value(mut self, value: Scalar) -> Self {
        self.on_missing = MissingPolicy::UseDefault(value);
        self
    }

    pub fn derived(mut self, derive: DeriveFn) -> Self {
        self.on_missing = MissingPolicy::Derive(derive);
        self
    }

    /// Priority of `raw_key` among this field's aliases (0 = preferred).
    pub fn alias_rank(&self, raw_key: &str) -> Option<usize> {
        self.aliases.iter().position(|a| a == raw_key)
    }

    /// Coerce a raw token to this field's type, honouring nullability.
    pub fn coerce(&self, raw: &str) -> Scalar {
        if self.ty == TypeTag::String && self.nullable && raw.trim().is_empty() {
            return Scalar::Null;
        }
        coerce(raw, self.ty)
    }

    /// True when `raw` should have produced a value but coercion gave `Null`.
    pub fn is_coercion_failure(&self, raw: &str, value: &Scalar) -> bool {
        if !value.is_null() {
            return false;
        }
        match self.ty {
            TypeTag::Int | TypeTag::Float => !is_na_token(raw),
            TypeTag::Bool => !raw.trim().is_empty(),
            TypeTag::String => false,
        }
    }

    /// Value for a field the section does not carry, if any.
    pub fn fill_missing(&self, source: &dyn FieldSource) -> Option<Scalar> {
        match &self.on_missing {
            MissingPolicy::UseDefault(v) => Some(v.clone()),
            MissingPolicy::Derive(f) => Some(f(source)).filter(|v| !v.is_null()),
            MissingPolicy::Null => None,
        }
    }
}

/// Find the spec accepting `raw_key`, trying specs in registration order.
///
/// Matching is exact and case-sensitive; the first spec listing the key wins.
pub fn resolve<'a>(raw_key: &str, specs: &'a [FieldSpec]) -> Option<&'a FieldSpec> {
    resolve_ranked(raw_key, specs).map(|(spec, _)| spec)
}

/// Like [`resolve`], also returning the alias priority that matched.
pub fn resolve_ranked<'a>(raw_key: &str, specs: &'a [FieldSpec]) -> Option<(&'a FieldSpec, usize)> {
    specs
        .iter()
        .find_map(|spec| spec.alias_rank(raw_key).map(|rank| (spec, rank)))
}

/// Field table and unknown-key policy for one section.
#[derive(Debug, Clone)]
pub struct SectionSchema {
    pub section: SectionName,
    pub fields: Vec<FieldSpec>,
    pub unknown_fields: UnknownFieldPolicy,
}

impl SectionSchema {
    pub fn new(section: SectionName, fields: Vec<FieldSpec>) -> Self {
        Self {
            section,
            fields,
            unknown_fields: UnknownFieldPolicy::PassThrough,
        }
    }

    pub fn kind(&self) -> SectionKind {
        self.section.kind()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn resolve(&self, raw_key: &str) -> Option<&FieldSpec> {
        resolve(raw_key, &self.fields)
    }

    pub fn resolve_ranked(&self, raw_key: &str) -> Option<(&FieldSpec, usize)> {
        resolve_ranked(raw_key, &self.fields)
    }

    /// Append aliases to `canonical`, registering it as a `Float` field
    /// when the table does not know it yet.
    pub fn add_aliases(&mut self, canonical: &str, aliases: &[String]) {
        let idx = match self.fields.iter().position(|f| f.name == canonical) {
            Some(idx) => idx,
            None => {
                self.fields.push(FieldSpec::new(canonical, TypeTag::Float));
                self.fields.len() - 1
            }
        };
        let spec = &mut self.fields[idx];
        for alias in aliases {
            if !spec.aliases.contains(alias) {
                spec.aliases.push(alias.clone());
            }
        }
    }
}

/// Complete set of section tables plus the sections a file must contain.
#[derive(Debug, Clone)]
pub struct ReportSchema {
    sections: BTreeMap<SectionName, SectionSchema>,
    required: Vec<SectionName>,
}

static BUILTIN_SCHEMA: LazyLock<ReportSchema> = LazyLock::new(|| {
    let sections = [
        SectionSchema::new(SectionName::Configuration, config_fields()),
        SectionSchema::new(SectionName::OverallStats, overall_fields()),
        SectionSchema::new(SectionName::PerNodeStats, node_fields()),
        SectionSchema::new(SectionName::PerGatewayStats, gateway_fields()),
        SectionSchema::new(SectionName::InterferenceStats, interference_fields()),
        SectionSchema::new(SectionName::CaptureEffectAnalysis, capture_fields()),
    ];
    ReportSchema {
        sections: sections.into_iter().map(|s| (s.section, s)).collect(),
        required: vec![SectionName::OverallStats, SectionName::PerNodeStats],
    }
});

impl Default for ReportSchema {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ReportSchema {
    /// The built-in tables for every known section.
    pub fn builtin() -> Self {
        BUILTIN_SCHEMA.clone()
    }

    pub fn section(&self, name: SectionName) -> Option<&SectionSchema> {
        self.sections.get(&name)
    }

    pub fn section_mut(&mut self, name: SectionName) -> Option<&mut SectionSchema> {
        self.sections.get_mut(&name)
    }

    pub fn required_sections(&self) -> &[SectionName] {
        &self.required
    }

    pub fn with_required(mut self, required: Vec<SectionName>) -> Self {
        self.required = required;
        self
    }

    pub fn with_unknown_policy(mut self, section: SectionName, policy: UnknownFieldPolicy) -> Self {
        if let Some(s) = self.sections.get_mut(&section) {
            s.unknown_fields = policy;
        }
        self
    }

    pub fn add_aliases(&mut self, section: SectionName, canonical: &str, aliases: &[String]) {
        if let Some(s) = self.sections.get_mut(&section) {
            s.add_aliases(canonical, aliases);
        }
    }
}

// ============================================================================
// Built-in field tables
// ============================================================================

fn int(name: &str) -> FieldSpec {
    FieldSpec::new(name, TypeTag::Int)
}

fn float(name: &str) -> FieldSpec {
    FieldSpec::new(name, TypeTag::Float)
}

fn flag(name: &str) -> FieldSpec {
    FieldSpec::new(name, TypeTag::Bool)
}

fn text(name: &str) -> FieldSpec {
    FieldSpec::new(name, TypeTag::String)
}

fn config_fields() -> Vec<FieldSpec> {
    vec![
        flag("EnableADR").aliases(&["EnableADR", "ADR", "evaluateADRinServer"]),
        flag("InitSF"),
        flag("InitTP"),
        int("DefaultSF"),
        float("DefaultTP_dBm"),
        int("SpreadingFactor").aliases(&["SpreadingFactor", "SF", "initialLoRaSF"]),
        int("PacketInterval_s").aliases(&["PacketInterval_s", "SendInterval_s", "Interval_s", "sendInterval_s"]),
        float("SimulationTime_s").aliases(&["SimulationTime_s", "SimTime_s", "simTime_s"]),
        int("NumberOfNodes").aliases(&["NumberOfNodes", "Nodes", "NumNodes", "numberOfNodes"]),
        int("NumberOfGateways").aliases(&["NumberOfGateways", "Gateways", "NumGateways"]),
        text("PropagationModel"),
    ]
}

fn overall_fields() -> Vec<FieldSpec> {
    vec![
        int("TotalSent").aliases(&["TotalSent", "UL_Sent", "Sent"]),
        int("TotalReceived").aliases(&["TotalReceived", "UL_Received", "Received"]),
        float("PDR_percent").aliases(&["PDR_Percent", "PDR_percent", "PDR"]),
        int("Dropped").aliases(&["PacketsDropped_SentMinusReceived", "Dropped", "TotalDropped", "Drops"]),
        float("DropRate_percent").aliases(&["DropRate_Percent", "DropRate_percent"]),
        int("TotalCollisions").aliases(&["TotalCollisions", "Collisions_Total"]),
        int("TotalInterference"),
        int("TotalUnderSensitivity").aliases(&["TotalUnderSensitivity", "UnderSensitivity_Total"]),
        float("CollisionRate_percent").aliases(&["CollisionRate_Percent", "CollisionRate_percent"]),
        float("UnderSensitivityRate_percent").aliases(&[
            "UnderSensitivityRate_Percent",
            "UnderSensitivityRate_percent",
            "InterferenceRate_Percent",
        ]),
        int("SpreadingFactor").aliases(&["SpreadingFactor", "SF"]),
        int("PacketInterval_s").aliases(&["PacketInterval_s", "Interval_s", "SendInterval_s"]),
        float("ChannelUtilization_percent").aliases(&["ChannelUtilization_Percent", "ChannelUtilization_percent"]),
        float("TotalAirTime_ms"),
        float("TheoreticalAirTimePerPacket_ms").aliases(&["TheoreticalAirTimePerPacket_ms", "TheoreticalToA_ms"]),
        float("AvgSF"),
        flag("ADR_Enabled").aliases(&["ADR_Enabled", "ADREnabled"]),
        int("TotalADRChanges").aliases(&["TotalADRChanges", "TotalADRCommands"]),
        int("ADRRequests"),
        int("ADRResponses"),
        int("NodesWithADRChanges"),
        int("NumberOfGateways").aliases(&["NumberOfGateways", "Gateways", "NumGateways"]),
        int("NumberOfNodes").aliases(&["NumberOfNodes", "Nodes", "NumNodes"]),
        int("TotalRawHearings"),
        int("UniquePackets"),
        int("DuplicatePackets"),
        float("UniquePDR_percent").aliases(&["UniquePDR_Percent", "UniquePDR_percent"]),
        float("RawHearingsRate_percent").aliases(&["RawHearingsRate_Percent", "RawHearingsRate_percent"]),
        float("DeduplicationRate_percent").aliases(&["DeduplicationRate_Percent", "DeduplicationRate_percent"]),
        float("AvgHearingsPerUplink"),
        float("GatewayLoadVariance"),
        float("AirtimeReduction_vs_SF12_percent").aliases(&[
            "AirtimeReduction_vs_SF12_Percent",
            "AirtimeReduction_vs_SF12_percent",
        ]),
        float("AirtimeScale_vs_SF7"),
    ]
}

fn node_pdr(row: &dyn FieldSource) -> Scalar {
    percent(row.number("Received"), row.number("Sent")).into()
}

fn node_drops(row: &dyn FieldSource) -> Scalar {
    match (row.integer("Sent"), row.integer("Received")) {
        (Some(sent), Some(received)) => sent.checked_sub(received).map_or(Scalar::Null, Scalar::Int),
        _ => Scalar::Null,
    }
}

fn node_fields() -> Vec<FieldSpec> {
    vec![
        int("NodeID").aliases(&["NodeID", "NodeId", "Node"]),
        int("Sent").aliases(&["Sent", "UL_Sent", "TotalSent"]),
        int("Received").aliases(&["Received", "UL_Received", "TotalReceived"]),
        float("PDR_percent")
            .aliases(&["PDR_Percent", "PDR_percent", "PDR"])
            .derived(node_pdr),
        int("Drops").aliases(&["Drops", "Dropped"]).derived(node_drops),
        int("Collisions").aliases(&["Losses", "Collisions"]),
        int("Interference"),
        int("ADR_Changes"),
        int("InitSF_DR"),
        int("FinalSF_DR"),
        int("InitialSF").aliases(&["InitialSF", "InitSF"]),
        int("FinalSF"),
        float("InitTP_dBm").aliases(&["InitTP_dBm", "InitialTP_dBm"]),
        float("FinalTP_dBm"),
        float("AirTime_ms"),
        float("DutyCycleUsage_percent").aliases(&["DutyCycleUsage_Percent", "DutyCycleUsage_percent"]),
        int("TransmissionCount"),
        float("AvgRSSI_dBm"),
        float("AvgSNR_dB").aliases(&["AvgSNR_dB", "AvgSNIR_dB"]),
        float("Distance_m"),
        float("Position_X"),
        float("Position_Y"),
        int("RSSISamples"),
        float("EstimatedRSSI_dBm"),
        text("Cohort"),
        int("RawHearings"),
        int("UniqueReceived"),
        float("UniquePDR_percent").aliases(&["UniquePDR_Percent", "UniquePDR_percent"]),
        int("OwnerGatewayIdx"),
        text("GatewayDistributionUnique").nullable(),
    ]
}

fn gateway_fields() -> Vec<FieldSpec> {
    vec![
        int("GatewayID").aliases(&["GatewayID", "GatewayId", "GW_ID"]),
        int("RawHearings"),
        int("UniqueReceived"),
        float("LoadPercentage").aliases(&["LoadPercentage", "Load_Percent"]),
        float("Position_X"),
        float("Position_Y"),
    ]
}

fn interference_fields() -> Vec<FieldSpec> {
    vec![
        int("RxOk_Total"),
        int("Lost_Interference_Total"),
        int("Lost_UnderSensitivity_Total"),
    ]
}

fn capture_fields() -> Vec<FieldSpec> {
    vec![
        float("NearCohortPDR_percent").aliases(&["NearCohortPDR_Percent", "NearCohortPDR_percent"]),
        float("FarCohortPDR_percent").aliases(&["FarCohortPDR_Percent", "FarCohortPDR_percent"]),
    ]
}
