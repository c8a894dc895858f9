//! Fixed mailboxes used to build email envelopes.
//!
//! Every address here depends on the deployment environment: production
//! sends to the real distribution lists, anything else is redirected to the
//! staging list so test traffic never reaches management.

use crate::config::DeliveryConfig;
use crate::domain::template::AdminList;

/// Environment-aware view over [`DeliveryConfig`]
#[derive(Debug, Clone)]
pub struct AddressBook {
    config: DeliveryConfig,
}

impl AddressBook {
    pub fn new(config: DeliveryConfig) -> Self {
        Self { config }
    }

    fn is_production(&self) -> bool {
        self.config.environment.is_production()
    }

    fn production_or_staging(&self, production: &[String]) -> Vec<String> {
        if self.is_production() {
            production.to_vec()
        } else {
            self.config.staging_list.clone()
        }
    }

    /// CC for a broadcast notice
    pub fn admin_broadcast_cc(&self, list: AdminList) -> Vec<String> {
        let production = match list {
            AdminList::Management => &self.config.management_list,
            AdminList::HigherManagement => &self.config.higher_management_list,
            AdminList::Report => &self.config.report_list,
        };
        self.production_or_staging(production)
    }

    /// BCC for a broadcast notice, the same in every environment
    pub fn admin_broadcast_bcc(&self) -> Vec<String> {
        self.config.staging_list.clone()
    }

    /// BCC for templates that always escalate to higher management
    pub fn escalation_bcc(&self) -> Vec<String> {
        self.production_or_staging(&self.config.higher_management_list)
    }

    /// Mailbox that receives partner confirmation copies
    pub fn partner_confirmation(&self) -> &str {
        if self.is_production() {
            &self.config.partner_confirmation_address
        } else {
            &self.config.partner_confirmation_address_staging
        }
    }

    /// Recipient used when the resolved primary has no address on file
    pub fn operations_fallback(&self) -> &str {
        if self.is_production() {
            &self.config.operations_fallback_address
        } else {
            &self.config.operations_fallback_address_staging
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::DeploymentEnvironment;

    pub(crate) fn delivery_config(environment: DeploymentEnvironment) -> DeliveryConfig {
        DeliveryConfig {
            environment,
            management_list: vec!["management@example.com".to_string()],
            higher_management_list: vec!["directors@example.com".to_string()],
            report_list: vec!["reports@example.com".to_string()],
            staging_list: vec!["staging@example.com".to_string()],
            partner_confirmation_address: "partners@example.com".to_string(),
            partner_confirmation_address_staging: "partners-stage@example.com".to_string(),
            operations_fallback_address: "ops@example.com".to_string(),
            operations_fallback_address_staging: "ops-stage@example.com".to_string(),
        }
    }

    #[test]
    fn test_production_lists() {
        let book = AddressBook::new(delivery_config(DeploymentEnvironment::Production));

        assert_eq!(book.admin_broadcast_cc(AdminList::Management), vec!["management@example.com"]);
        assert_eq!(book.admin_broadcast_cc(AdminList::Report), vec!["reports@example.com"]);
        assert_eq!(book.escalation_bcc(), vec!["directors@example.com"]);
        assert_eq!(book.admin_broadcast_bcc(), vec!["staging@example.com"]);
        assert_eq!(book.partner_confirmation(), "partners@example.com");
        assert_eq!(book.operations_fallback(), "ops@example.com");
    }

    #[test]
    fn test_non_production_redirects_to_staging() {
        let book = AddressBook::new(delivery_config(DeploymentEnvironment::Staging));

        assert_eq!(
            book.admin_broadcast_cc(AdminList::HigherManagement),
            vec!["staging@example.com"]
        );
        assert_eq!(book.escalation_bcc(), vec!["staging@example.com"]);
        assert_eq!(book.partner_confirmation(), "partners-stage@example.com");
        assert_eq!(book.operations_fallback(), "ops-stage@example.com");
    }
}
