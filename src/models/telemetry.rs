use serde::{Deserialize, Serialize};

/// A quantity carried by `metric` frames and charted over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SampleField {
    Spm,
    LeftHandHeight,
    RightHandHeight,
    HeadHeight,
    HipHeight,
    Rotation,
    LeftAxilla,
    RightAxilla,
    StrokeCount,
}

impl SampleField {
    pub const ALL: [SampleField; 9] = [
        SampleField::Spm,
        SampleField::LeftHandHeight,
        SampleField::RightHandHeight,
        SampleField::HeadHeight,
        SampleField::HipHeight,
        SampleField::Rotation,
        SampleField::LeftAxilla,
        SampleField::RightAxilla,
        SampleField::StrokeCount,
    ];

    /// Wire names in lookup priority: the canonical key first, then the
    /// legacy keys older backends emit for the same quantity.
    pub fn wire_names(self) -> &'static [&'static str] {
        match self {
            SampleField::Spm => &["spm", "stroke_rate"],
            SampleField::LeftHandHeight => &["left_hand", "list_mun_izq"],
            SampleField::RightHandHeight => &["right_hand", "list_mun_der"],
            SampleField::HeadHeight => &["head", "list_head_alt"],
            SampleField::HipHeight => &["hip", "list_hip"],
            SampleField::Rotation => &["rotation"],
            SampleField::LeftAxilla => &["left_axilla", "list_angle_axi_izq"],
            SampleField::RightAxilla => &["right_axilla", "list_angle_axi_der"],
            SampleField::StrokeCount => &["strokes"],
        }
    }
}

/// One optional value per [`SampleField`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_hand_height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_hand_height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hip_height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_axilla: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_axilla: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_count: Option<f64>,
}

impl SampleValues {
    pub fn get(&self, field: SampleField) -> Option<f64> {
        match field {
            SampleField::Spm => self.spm,
            SampleField::LeftHandHeight => self.left_hand_height,
            SampleField::RightHandHeight => self.right_hand_height,
            SampleField::HeadHeight => self.head_height,
            SampleField::HipHeight => self.hip_height,
            SampleField::Rotation => self.rotation,
            SampleField::LeftAxilla => self.left_axilla,
            SampleField::RightAxilla => self.right_axilla,
            SampleField::StrokeCount => self.stroke_count,
        }
    }

    pub fn set(&mut self, field: SampleField, value: Option<f64>) {
        let slot = match field {
            SampleField::Spm => &mut self.spm,
            SampleField::LeftHandHeight => &mut self.left_hand_height,
            SampleField::RightHandHeight => &mut self.right_hand_height,
            SampleField::HeadHeight => &mut self.head_height,
            SampleField::HipHeight => &mut self.hip_height,
            SampleField::Rotation => &mut self.rotation,
            SampleField::LeftAxilla => &mut self.left_axilla,
            SampleField::RightAxilla => &mut self.right_axilla,
            SampleField::StrokeCount => &mut self.stroke_count,
        };
        *slot = value;
    }

    pub fn with(mut self, field: SampleField, value: f64) -> Self {
        self.set(field, Some(value));
        self
    }
}

/// A point in the live series. `t` is seconds since the session's stream
/// started, measured locally on receipt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    pub t: f64,
    #[serde(flatten)]
    pub values: SampleValues,
}

impl TelemetrySample {
    pub fn get(&self, field: SampleField) -> Option<f64> {
        self.values.get(field)
    }
}
