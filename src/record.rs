use crate::constants::{BASIC_COLUMNS, CATEGORY_DELIMITER, EXTENDED_COLUMNS};
use serde::{Deserialize, Serialize};

/// Validated, persisted representation of one business.
///
/// Only [`crate::transform::RecordTransformer`] builds these, so `place_id` is always non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessRecord {
    pub place_id: String,
    pub name: String,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub categories: Vec<String>,
    pub website_url: Option<String>,
    pub map_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Which columns a tabular sink writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLayout {
    /// `place_id, name, address, phone_number, categories`
    Basic,
    /// Basic columns followed by `website_url, map_url, latitude, longitude`
    Extended,
}

impl RecordLayout {
    pub fn header(self) -> Vec<&'static str> {
        let mut columns = BASIC_COLUMNS.to_vec();
        if self == RecordLayout::Extended {
            columns.extend_from_slice(&EXTENDED_COLUMNS);
        }
        columns
    }
}

impl BusinessRecord {
    /// Flatten into one tabular row. Absent values become empty cells and categories are
    /// joined into a single cell.
    pub fn to_row(&self, layout: RecordLayout) -> Vec<String> {
        let mut row = vec![
            self.place_id.clone(),
            self.name.clone(),
            self.address.clone().unwrap_or_default(),
            self.phone_number.clone().unwrap_or_default(),
            self.categories.join(CATEGORY_DELIMITER),
        ];
        if layout == RecordLayout::Extended {
            row.push(self.website_url.clone().unwrap_or_default());
            row.push(self.map_url.clone().unwrap_or_default());
            row.push(self.latitude.map(|v| v.to_string()).unwrap_or_default());
            row.push(self.longitude.map(|v| v.to_string()).unwrap_or_default());
        }
        row
    }
}
