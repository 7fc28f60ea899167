//! Static provisioning-service endpoint table
//!
//! Region resolution is a lookup against this table; deployments against a
//! region the service is not known in fail before any API call is made.

use crate::error::DeployError;

/// CloudFormation endpoints by region
const CLOUDFORMATION_ENDPOINTS: &[(&str, &str)] = &[
    ("us-east-1", "https://cloudformation.us-east-1.amazonaws.com"),
    ("us-east-2", "https://cloudformation.us-east-2.amazonaws.com"),
    ("us-west-1", "https://cloudformation.us-west-1.amazonaws.com"),
    ("us-west-2", "https://cloudformation.us-west-2.amazonaws.com"),
    ("ca-central-1", "https://cloudformation.ca-central-1.amazonaws.com"),
    ("eu-west-1", "https://cloudformation.eu-west-1.amazonaws.com"),
    ("eu-west-2", "https://cloudformation.eu-west-2.amazonaws.com"),
    ("eu-west-3", "https://cloudformation.eu-west-3.amazonaws.com"),
    ("eu-central-1", "https://cloudformation.eu-central-1.amazonaws.com"),
    ("eu-north-1", "https://cloudformation.eu-north-1.amazonaws.com"),
    ("ap-northeast-1", "https://cloudformation.ap-northeast-1.amazonaws.com"),
    ("ap-northeast-2", "https://cloudformation.ap-northeast-2.amazonaws.com"),
    ("ap-south-1", "https://cloudformation.ap-south-1.amazonaws.com"),
    ("ap-southeast-1", "https://cloudformation.ap-southeast-1.amazonaws.com"),
    ("ap-southeast-2", "https://cloudformation.ap-southeast-2.amazonaws.com"),
    ("sa-east-1", "https://cloudformation.sa-east-1.amazonaws.com"),
];

/// Resolve the provisioning endpoint for a region.
pub fn endpoint_for(region: &str) -> Result<&'static str, DeployError> {
    CLOUDFORMATION_ENDPOINTS
        .iter()
        .find(|(name, _)| *name == region)
        .map(|(_, endpoint)| *endpoint)
        .ok_or_else(|| DeployError::Region {
            name: region.to_string(),
        })
}
