mod capability_kind;
mod device_target;
pub mod floor;
mod subscription_key;
mod value;

pub use capability_kind::CapabilityKind;
pub use device_target::DeviceTarget;
pub use subscription_key::{SubscriptionKey, WidgetId};
pub use value::Value;
