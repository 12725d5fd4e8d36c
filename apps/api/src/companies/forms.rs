//! Company directory form.

use serde::Deserialize;

use crate::errors::AppError;

pub const COMPANY_REQUIRED_MESSAGE: &str = "Company name and industry are required.";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompanyForm {
    pub name: String,
    pub industry: String,
    pub location: String,
    pub website: String,
    pub description: String,
    pub logo: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompanyFields {
    pub name: String,
    pub industry: String,
    pub location: String,
    pub website: String,
    pub description: String,
    pub logo: String,
}

impl CompanyForm {
    pub fn parse(self) -> Result<CompanyFields, AppError> {
        let name = self.name.trim().to_string();
        let industry = self.industry.trim().to_string();
        if name.is_empty() || industry.is_empty() {
            return Err(AppError::Validation(COMPANY_REQUIRED_MESSAGE.to_string()));
        }

        Ok(CompanyFields {
            name,
            industry,
            location: self.location.trim().to_string(),
            website: self.website.trim().to_string(),
            description: self.description,
            logo: self.logo.trim().to_string(),
        })
    }
}
