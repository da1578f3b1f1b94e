use serde::{Deserialize, Serialize};

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrugProduct {
    pub item_name: String,
    pub entp_name: String,
    /// Main ingredient.
    pub item_ingr_name: String,
    /// Insurance (EDI) code.
    pub edi_code: String,
    pub prdlst_stdr_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrugDetail {
    pub item_name: Option<String>,
    pub entp_name: Option<String>,
    pub main_item_ingr: Option<String>,
    pub storage_method: Option<String>,
    pub valid_term: Option<String>,
    /// Physical description of the product.
    pub chart: Option<String>,
    pub bar_code: Option<String>,
    pub atc_code: Option<String>,
    pub rare_drug: bool,
}

/// Registry item as returned by the search operation.
#[derive(Debug, Deserialize)]
pub(crate) struct RawProduct {
    #[serde(rename = "ITEM_NAME", default)]
    item_name: Option<String>,
    #[serde(rename = "ENTP_NAME", default)]
    entp_name: Option<String>,
    #[serde(rename = "ITEM_INGR_NAME", default)]
    item_ingr_name: Option<String>,
    #[serde(rename = "EDI_CODE", default)]
    edi_code: Option<String>,
    #[serde(rename = "PRDLST_STDR_CODE", default)]
    prdlst_stdr_code: Option<String>,
}

impl From<RawProduct> for DrugProduct {
    fn from(raw: RawProduct) -> Self {
        Self {
            item_name: raw.item_name.unwrap_or_default(),
            entp_name: raw.entp_name.unwrap_or_default(),
            item_ingr_name: raw.item_ingr_name.unwrap_or_default(),
            edi_code: raw.edi_code.unwrap_or_default(),
            prdlst_stdr_code: raw.prdlst_stdr_code.unwrap_or_default(),
        }
    }
}

/// Registry item as returned by the detail operation.
#[derive(Debug, Deserialize)]
pub(crate) struct RawDetail {
    #[serde(rename = "ITEM_NAME", default)]
    item_name: Option<String>,
    #[serde(rename = "ENTP_NAME", default)]
    entp_name: Option<String>,
    #[serde(rename = "MAIN_ITEM_INGR", default)]
    main_item_ingr: Option<String>,
    #[serde(rename = "STORAGE_METHOD", default)]
    storage_method: Option<String>,
    #[serde(rename = "VALID_TERM", default)]
    valid_term: Option<String>,
    #[serde(rename = "CHART", default)]
    chart: Option<String>,
    #[serde(rename = "BAR_CODE", default)]
    bar_code: Option<String>,
    #[serde(rename = "ATC_CODE", default)]
    atc_code: Option<String>,
    #[serde(rename = "RARE_DRUG_YN", default)]
    rare_drug_yn: Option<String>,
}

impl From<RawDetail> for DrugDetail {
    fn from(raw: RawDetail) -> Self {
        Self {
            item_name: raw.item_name,
            entp_name: raw.entp_name,
            main_item_ingr: raw.main_item_ingr,
            storage_method: raw.storage_method,
            valid_term: raw.valid_term,
            chart: raw.chart,
            bar_code: raw.bar_code,
            atc_code: raw.atc_code,
            rare_drug: raw.rare_drug_yn.as_deref() == Some("Y"),
        }
    }
}
