pub mod assignment;
pub mod certification;
pub mod domain;
pub mod lifecycle;
pub mod ports;

pub use domain::{
    AuthUser, Certification, CertificationStatus, ChatMessage, ChatSender, ClientProfile,
    NewSession, QuizResult, Role, Session, SessionKind, SessionStatus, User, UserCertification,
    UserCredentials,
};
pub use ports::{DatabaseService, PortError, PortResult, SessionFilter, TherapyChatService};
