//! Where each crop's data lives.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::layers::LayerSource;
use crate::mgmt::MgmtComponent;

pub const PRECIP_TABLE: &str = "umn.Precip";
pub const PRECIP_FIELD: &str = "precip";
pub const GDD_TABLE: &str = "umn.GDD_v3";
pub const GDD_FIELD_PREFIX: &str = "GDD";

/// Lowest GDD field index present in the GDD table.
pub const GDD_FIELD_INDEX_MIN: f64 = 0.0;
/// Highest GDD field index present in the GDD table.
pub const GDD_FIELD_INDEX_MAX: f64 = 12.0;

/// Data sources and parameters for one crop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CropInfo {
    pub table: String,
    pub yield_field: String,
    pub area_field: String,
    /// Base temperature (°C) for growing degree days.
    pub gdd_base: f64,
    pub crop_id: String,
    pub years: Vec<u32>,
    #[serde(default)]
    pub npki_table: Option<String>,
    /// Field names in N, P, K, I order.
    #[serde(default)]
    pub npki_fields: Option<[String; 4]>,
}

impl CropInfo {
    pub fn yield_source(&self) -> LayerSource {
        LayerSource::new(&self.table, &self.yield_field)
    }

    pub fn area_source(&self) -> LayerSource {
        LayerSource::new(&self.table, &self.area_field)
    }

    /// Source of the applied-management layer for `component`, if the crop
    /// has management data.
    pub fn mgmt_source(&self, component: MgmtComponent) -> Option<LayerSource> {
        let table = self.npki_table.as_ref()?;
        let field = &self.npki_fields.as_ref()?[component.index()];
        Some(LayerSource::new(table, field))
    }
}

/// Crops that can be modeled, keyed by common name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CropCatalog {
    crops: BTreeMap<String, CropInfo>,
}

impl CropCatalog {
    pub fn new(crops: BTreeMap<String, CropInfo>) -> Self {
        Self { crops }
    }

    /// The crops of the global crop datasets.
    pub fn builtin() -> Self {
        let group = |yield_field: &str, area_field: &str, crop_id: &str| {
            crop("umn.All_Cropgroups", yield_field, area_field, 0.0, crop_id, 2000)
        };
        let mut maize = crop("umn.Crops_2005", "maize_yield", "maize_area", 8.0, "maize", 2005);
        maize.npki_table = Some("umn.npki".to_string());
        maize.npki_fields = Some(["maizeN", "maizeP2O5", "maizeK2O", "maizeI"].map(String::from));

        let crops = [
            ("cereals", group("Cereals_yield", "Cereals_area", "cerealnes")),
            ("fiber", group("Fiber_yield", "Fiber_area", "fibrenes")),
            ("fruit", group("Fruit_yield", "Fruit_area", "fruitnes")),
            ("treenuts", group("Treenuts_yield", "Treenuts_area", "nutnes")),
            // The crop-group table has no vegetable fields yet.
            ("vegetables", group("Treenuts_yield", "Treenuts_area", "vegetablenes")),
            ("maize", maize),
            ("quince", crop("umn.Crops_Q", "quince_yield", "quince_area", 0.0, "quince", 2000)),
            ("quinoa", crop("umn.Crops_Q", "quinoa_yield", "quinoa_area", 2.0, "quinoa", 2000)),
            ("rice", crop("umn.Crops_2005", "rice_yield", "rice_area", 5.0, "rice", 2005)),
            ("wheat", crop("umn.Crops_2005", "wheat_yield", "wheat_area", 0.0, "wheat", 2005)),
        ];
        Self {
            crops: crops
                .into_iter()
                .map(|(name, info)| (name.to_string(), info))
                .collect(),
        }
    }

    pub fn crop_names(&self) -> Vec<&str> {
        self.crops.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, crop: &str) -> bool {
        self.crops.contains_key(crop)
    }

    pub fn crop_info(&self, crop: &str) -> Result<&CropInfo, ModelError> {
        self.crops
            .get(crop)
            .ok_or_else(|| ModelError::UnknownCrop(crop.to_string()))
    }

    /// Most recent year of data for `crop`.
    pub fn latest_year(&self, crop: &str) -> Result<Option<u32>, ModelError> {
        Ok(self.crop_info(crop)?.years.iter().copied().max())
    }

    /// Index of the GDD field holding growing degree days for `crop` under a
    /// temperature change of `temp_change` °C. Not range checked.
    pub fn gdd_index(&self, crop: &str, temp_change: f64) -> Result<f64, ModelError> {
        Ok(self.crop_info(crop)?.gdd_base - temp_change)
    }

    /// GDD layer source for `crop` under `temp_change`.
    pub fn gdd_source(&self, crop: &str, temp_change: f64) -> Result<LayerSource, ModelError> {
        let index = self.gdd_index(crop, temp_change)?;
        Ok(LayerSource::new(GDD_TABLE, format!("{GDD_FIELD_PREFIX}{index}")))
    }

    pub fn precip_source() -> LayerSource {
        LayerSource::new(PRECIP_TABLE, PRECIP_FIELD)
    }
}

fn crop(
    table: &str,
    yield_field: &str,
    area_field: &str,
    gdd_base: f64,
    crop_id: &str,
    year: u32,
) -> CropInfo {
    CropInfo {
        table: table.to_string(),
        yield_field: yield_field.to_string(),
        area_field: area_field.to_string(),
        gdd_base,
        crop_id: crop_id.to_string(),
        years: vec![year],
        npki_table: None,
        npki_fields: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_lists_crops_by_name() {
        let catalog = CropCatalog::builtin();
        assert_eq!(
            catalog.crop_names(),
            [
                "cereals", "fiber", "fruit", "maize", "quince", "quinoa", "rice", "treenuts",
                "vegetables", "wheat"
            ]
        );
        assert_eq!(catalog.latest_year("maize"), Ok(Some(2005)));
        assert_eq!(
            catalog.crop_info("barley"),
            Err(ModelError::UnknownCrop("barley".to_string()))
        );
    }

    #[test]
    fn only_maize_has_management_data() {
        let catalog = CropCatalog::builtin();
        let maize = catalog.crop_info("maize").unwrap();
        assert_eq!(
            maize.mgmt_source(MgmtComponent::Phosphorus),
            Some(LayerSource::new("umn.npki", "maizeP2O5"))
        );
        let rice = catalog.crop_info("rice").unwrap();
        assert_eq!(rice.mgmt_source(MgmtComponent::Nitrogen), None);
    }

    #[test]
    fn gdd_field_follows_base_temperature() {
        let catalog = CropCatalog::builtin();
        assert_eq!(catalog.gdd_index("maize", 2.0), Ok(6.0));
        assert_eq!(
            catalog.gdd_source("maize", 0.0),
            Ok(LayerSource::new("umn.GDD_v3", "GDD8"))
        );
        assert_eq!(
            catalog.gdd_source("rice", -3.0),
            Ok(LayerSource::new("umn.GDD_v3", "GDD8"))
        );
    }
}
