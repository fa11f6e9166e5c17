//! Model of the VRF attachments response.
//!
//! `GET /appcenter/cisco/ndfc/api/v1/lan-fabric/rest/top-down/fabrics/{fabric}/vrfs/attachments`

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One switch's attachment state for a VRF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanAttachment {
    pub entity_name: Option<String>,
    pub fabric_name: String,
    /// JSON object encoded as a string by the controller.
    pub instance_values: Option<String>,
    pub ip_address: String,
    pub is_lan_attached: bool,
    pub lan_attach_state: String,
    pub peer_serial_no: Option<String>,
    pub switch_name: String,
    pub switch_role: String,
    pub switch_serial_no: String,
    pub vlan_id: Option<i64>,
    pub vrf_id: i64,
    pub vrf_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VrfData {
    pub lan_attach_list: Vec<LanAttachment>,
    pub vrf_name: String,
}

/// The controller's envelope around the per-VRF attachment lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct VrfAttachmentsResponse {
    pub data: Vec<VrfData>,
    pub message: String,
    pub method: String,
    pub request_path: String,
    pub return_code: u16,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("response does not match the VRF attachments model: {0}")]
    Shape(String),
    #[error("METHOD must be GET, found {0}")]
    Method(String),
    #[error("RETURN_CODE indicates failure: {0}")]
    ReturnCode(u16),
    #[error("REQUEST_PATH must contain /vrfs/attachments: {0}")]
    RequestPath(String),
    #[error("lanAttachList of VRF {0} is empty")]
    EmptyAttachList(String),
    #[error("instanceValues of switch {switch} is not valid JSON")]
    InstanceValues { switch: String },
}

impl VrfAttachmentsResponse {
    /// Deserializes and checks the response the way the controller promises
    /// it: a successful GET on the attachments endpoint where every VRF has
    /// at least one attachment.
    pub fn from_value(value: Value) -> Result<Self, ModelError> {
        let response: VrfAttachmentsResponse =
            serde_json::from_value(value).map_err(|e| ModelError::Shape(e.to_string()))?;
        response.validate()?;
        Ok(response)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.method != "GET" {
            return Err(ModelError::Method(self.method.clone()));
        }
        if !(200..=202).contains(&self.return_code) {
            return Err(ModelError::ReturnCode(self.return_code));
        }
        if !self.request_path.contains("/vrfs/attachments") {
            return Err(ModelError::RequestPath(self.request_path.clone()));
        }
        for vrf in &self.data {
            if vrf.lan_attach_list.is_empty() {
                return Err(ModelError::EmptyAttachList(vrf.vrf_name.clone()));
            }
            for attachment in &vrf.lan_attach_list {
                if let Some(raw) = &attachment.instance_values {
                    serde_json::from_str::<serde_json::Map<String, Value>>(raw).map_err(|_| {
                        ModelError::InstanceValues {
                            switch: attachment.switch_name.clone(),
                        }
                    })?;
                }
            }
        }
        Ok(())
    }

    pub fn vrf(&self, vrf_name: &str) -> Option<&VrfData> {
        self.data.iter().find(|vrf| vrf.vrf_name == vrf_name)
    }

    pub fn attachments(&self) -> impl Iterator<Item = &LanAttachment> {
        self.data.iter().flat_map(|vrf| vrf.lan_attach_list.iter())
    }
}

/// Filters for [`AttachmentQuery::run`]. Empty filters match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentQuery {
    pub vrf_name: Option<String>,
    pub switch_role: Option<String>,
    pub attached_only: bool,
    pub limit: Option<usize>,
}

impl AttachmentQuery {
    pub fn run<'a>(&self, response: &'a VrfAttachmentsResponse) -> Vec<&'a LanAttachment> {
        let matching = response
            .data
            .iter()
            .filter(|vrf| self.vrf_name.as_ref().is_none_or(|name| &vrf.vrf_name == name))
            .flat_map(|vrf| vrf.lan_attach_list.iter())
            .filter(|a| !self.attached_only || a.is_lan_attached)
            .filter(|a| {
                self.switch_role
                    .as_ref()
                    .is_none_or(|role| &a.switch_role == role)
            });
        match self.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }
}
