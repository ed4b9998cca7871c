mod details;
mod form;
mod ids;
mod question;
mod response;
mod user;

pub use details::{UserDetails, UserDetailsDraft, UserDetailsError};
pub use form::{
    FormAction, FormError, FormName, FormProgress, ProgressError, ProgressMarker, ProgressStatus,
    SubmissionPolicy,
};
pub use ids::{FormProgressId, ParseIdError, ResponseRecordId, SessionToken, UserId};
pub use question::Question;
pub use response::{ResponseError, ResponsePayload, ResponseRecord};
pub use user::{Email, RegistrationDraft, User, UserError, Username, ValidRegistration};
