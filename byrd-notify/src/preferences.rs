use byrd_core::{CoreError, CoreResult, FieldError, NotificationPreferences};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Deserialize;

/// Partial preferences update from the merchant settings screen.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferencesUpdate {
    pub notify_offer_activated: Option<bool>,
    pub notify_offer_expired: Option<bool>,
    pub notify_auto_extend: Option<bool>,
    pub notify_shortfall: Option<bool>,
    pub notify_budget: Option<bool>,
    pub sms_enabled: Option<bool>,
    pub email_enabled: Option<bool>,
    pub quiet_hours_enabled: Option<bool>,
    pub quiet_hours_start: Option<NaiveTime>,
    pub quiet_hours_end: Option<NaiveTime>,
    pub timezone: Option<String>,
}

impl PreferencesUpdate {
    /// Merge onto `current`. Unknown zone names are rejected here rather than silently
    /// evaluated as UTC later.
    pub fn apply(self, mut current: NotificationPreferences) -> CoreResult<NotificationPreferences> {
        if let Some(timezone) = self.timezone {
            if timezone.parse::<Tz>().is_err() {
                return Err(CoreError::Validation(vec![FieldError::new(
                    "timezone",
                    format!("Unknown timezone '{}'", timezone),
                )]));
            }
            current.timezone = timezone;
        }

        macro_rules! merge {
            ($($field:ident),*) => {
                $(if let Some(value) = self.$field {
                    current.$field = value;
                })*
            };
        }
        merge!(
            notify_offer_activated,
            notify_offer_expired,
            notify_auto_extend,
            notify_shortfall,
            notify_budget,
            sms_enabled,
            email_enabled,
            quiet_hours_enabled,
            quiet_hours_start,
            quiet_hours_end
        );

        Ok(current)
    }
}
