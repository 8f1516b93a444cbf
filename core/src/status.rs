//! Enumerated fields of a registration record.
//!
//! Each enum serializes to the exact string stored in documents, and exposes
//! `VALUES` so the submission schema can report the allowed set.

use crate::error::{RegistrationError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, field = $field:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Every stored representation, in declaration order.
            pub const VALUES: &'static [&'static str] = &[$($text),+];

            /// Stored string representation.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }

            /// Parse from the stored string representation.
            ///
            /// # Errors
            ///
            /// Returns [`RegistrationError::Validation`] for unknown values.
            pub fn parse(s: &str) -> Result<Self> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(RegistrationError::validation(
                        $field,
                        format!("`{other}` is not one of {}", Self::VALUES.join(", ")),
                    )),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum! {
    /// Coarse workflow label of a registration.
    ///
    /// Any state may move to any other; admins decide.
    RegistrationStatus, field = "registrationStatus" {
        /// Submitted, awaiting review
        Pending => "pending",
        /// Approved by an admin
        Confirmed => "confirmed",
        /// Withdrawn
        Cancelled => "cancelled",
        /// Accepted onto the waitlist
        Waitlist => "waitlist",
        /// Declined by an admin
        Rejected => "rejected",
        /// Present at the venue
        CheckedIn => "checked-in",
    }
}

string_enum! {
    /// Payment verification state.
    PaymentStatus, field = "paymentStatus" {
        /// Not yet verified
        Pending => "pending",
        /// Verified by an admin
        Verified => "verified",
        /// Payment failed
        Failed => "failed",
        /// Money returned
        Refunded => "refunded",
        /// Free event
        NotRequired => "not-required",
    }
}

string_enum! {
    /// How the participant paid.
    PaymentMethod, field = "paymentMethod" {
        /// Online gateway
        Online => "online",
        /// Paid at the desk
        Offline => "offline",
        /// Cash
        Cash => "cash",
        /// UPI transfer
        Upi => "upi",
        /// Card
        Card => "card",
        /// Net banking
        NetBanking => "netbanking",
        /// No payment
        None => "none",
    }
}

string_enum! {
    /// Channel the registration came through.
    Source, field = "source" {
        /// Website form
        Web => "web",
        /// Mobile app
        Mobile => "mobile",
        /// Entered by an admin
        Admin => "admin",
        /// Bulk import
        Import => "import",
    }
}

string_enum! {
    /// Triage priority.
    Priority, field = "priority" {
        /// Low
        Low => "low",
        /// Normal
        Normal => "normal",
        /// High
        High => "high",
    }
}

impl Default for RegistrationStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl Default for Source {
    fn default() -> Self {
        Self::Web
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

/// Outbound notification kinds tracked on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Registration confirmation email
    EmailConfirmation,
    /// Reminder email before the event
    ReminderEmail,
    /// SMS notification
    Sms,
    /// WhatsApp notification
    Whatsapp,
}
