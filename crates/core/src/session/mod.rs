mod clock;
mod codec;
mod error;
mod functions;
mod traits;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::PayloadCodec;
pub use error::{CodecError, StoreError, TableError};
pub use functions::{
    expiration, is_expired, plan_write, ttl_in_range, WritePlan, MAX_EXPIRES_MILLIS,
    MIN_EXPIRES_MILLIS,
};
pub use traits::{Result, SessionStore, SessionTable, TableResult};
pub use types::{ColumnValue, ExtraFields, RowUpdate, SessionData, SessionId, SessionRow};
