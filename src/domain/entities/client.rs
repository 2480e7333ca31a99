//! Client entity - a billing account with a daily-depleting balance

use crate::domain::value_objects::amount::Amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Pix,
    Boleto,
}

impl PaymentMethod {
    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "pix" => Ok(PaymentMethod::Pix),
            "boleto" => Ok(PaymentMethod::Boleto),
            other => Err(format!("Invalid payment method: {}", other)),
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Pix => write!(f, "pix"),
            PaymentMethod::Boleto => write!(f, "boleto"),
        }
    }
}

/// How often the client settles invoices. Informational only; the daily
/// batch never looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentFrequency {
    Weekly,
    Biweekly,
    Monthly,
}

impl PaymentFrequency {
    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "weekly" => Ok(PaymentFrequency::Weekly),
            "biweekly" => Ok(PaymentFrequency::Biweekly),
            "monthly" => Ok(PaymentFrequency::Monthly),
            other => Err(format!("Invalid payment frequency: {}", other)),
        }
    }
}

impl std::fmt::Display for PaymentFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentFrequency::Weekly => write!(f, "weekly"),
            PaymentFrequency::Biweekly => write!(f, "biweekly"),
            PaymentFrequency::Monthly => write!(f, "monthly"),
        }
    }
}

/// Whole days the current balance lasts at the given daily budget.
/// `None` when the budget is zero (the balance never depletes on its own).
pub fn days_until_depleted(current_balance: f64, daily_budget: f64) -> Option<i64> {
    if daily_budget <= 0.0 {
        return None;
    }
    Some((current_balance / daily_budget).floor() as i64)
}

#[derive(Debug, Clone)]
pub struct Client {
    pub id: String,
    pub manager_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_frequency: PaymentFrequency,
    pub daily_budget: Amount,
    pub current_balance: Amount,
    pub alert_threshold: Amount,
    pub is_active: bool,
}

impl Client {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        manager_id: String,
        name: String,
        phone: Option<String>,
        payment_method: PaymentMethod,
        payment_frequency: PaymentFrequency,
        daily_budget: f64,
        current_balance: f64,
        alert_threshold: f64,
        is_active: bool,
    ) -> Result<Self, String> {
        if name.trim().is_empty() {
            return Err("Client name must not be empty".to_string());
        }
        let daily_budget = Amount::new(daily_budget)?;
        let current_balance = Amount::new(current_balance)?;
        let alert_threshold = Amount::new(alert_threshold)?;

        Ok(Client {
            id,
            manager_id,
            name,
            phone,
            payment_method,
            payment_frequency,
            daily_budget,
            current_balance,
            alert_threshold,
            is_active,
        })
    }

    /// Whether the daily batch debits this client at all.
    pub fn is_billable(&self) -> bool {
        self.is_active && self.daily_budget.value() > 0.0
    }

    pub fn is_low_balance(&self) -> bool {
        self.current_balance.value() < self.alert_threshold.value()
    }

    pub fn days_until_depleted(&self) -> Option<i64> {
        days_until_depleted(self.current_balance.value(), self.daily_budget.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_client(daily_budget: f64, current_balance: f64, is_active: bool) -> Client {
        Client::new(
            "client-1".to_string(),
            "manager-1".to_string(),
            "Loja do João".to_string(),
            Some("+55 11 91234-5678".to_string()),
            PaymentMethod::Pix,
            PaymentFrequency::Monthly,
            daily_budget,
            current_balance,
            100.0,
            is_active,
        )
        .unwrap()
    }

    #[test]
    fn test_client_new_valid() {
        let client = sample_client(30.0, 150.0, true);
        assert_eq!(client.name, "Loja do João");
        assert_eq!(client.daily_budget.value(), 30.0);
        assert_eq!(client.current_balance.value(), 150.0);
        assert!(client.is_active);
    }

    #[test]
    fn test_client_new_empty_name() {
        let result = Client::new(
            "client-1".to_string(),
            "manager-1".to_string(),
            "   ".to_string(),
            None,
            PaymentMethod::Boleto,
            PaymentFrequency::Weekly,
            10.0,
            0.0,
            100.0,
            true,
        );
        assert!(result.is_err());
        assert_eq!(result.unwrap_err(), "Client name must not be empty");
    }

    #[test]
    fn test_client_new_negative_budget() {
        let result = Client::new(
            "client-1".to_string(),
            "manager-1".to_string(),
            "Cliente".to_string(),
            None,
            PaymentMethod::Pix,
            PaymentFrequency::Monthly,
            -5.0,
            0.0,
            100.0,
            true,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_is_billable() {
        assert!(sample_client(30.0, 150.0, true).is_billable());
        assert!(!sample_client(0.0, 150.0, true).is_billable());
        assert!(!sample_client(30.0, 150.0, false).is_billable());
    }

    #[test]
    fn test_is_low_balance() {
        assert!(sample_client(30.0, 50.0, true).is_low_balance());
        assert!(!sample_client(30.0, 150.0, true).is_low_balance());
    }

    #[test]
    fn test_days_until_depleted() {
        assert_eq!(sample_client(30.0, 150.0, true).days_until_depleted(), Some(5));
        assert_eq!(sample_client(30.0, 100.0, true).days_until_depleted(), Some(3));
        assert_eq!(sample_client(0.0, 150.0, true).days_until_depleted(), None);
        assert_eq!(sample_client(30.0, 0.0, true).days_until_depleted(), Some(0));
    }

    #[test]
    fn test_payment_method_roundtrip() {
        assert_eq!(PaymentMethod::parse("pix").unwrap(), PaymentMethod::Pix);
        assert_eq!(PaymentMethod::parse("boleto").unwrap(), PaymentMethod::Boleto);
        assert!(PaymentMethod::parse("cash").is_err());
        assert_eq!(PaymentMethod::Pix.to_string(), "pix");
    }

    #[test]
    fn test_payment_frequency_roundtrip() {
        assert_eq!(
            PaymentFrequency::parse("biweekly").unwrap(),
            PaymentFrequency::Biweekly
        );
        assert!(PaymentFrequency::parse("daily").is_err());
        assert_eq!(PaymentFrequency::Monthly.to_string(), "monthly");
    }
}
