mod stripe_signature;

pub use stripe_signature::{
    sign_payload,
    verify_signature,
    EventVerifier,
    SignatureError,
    SignatureHeader,
    StripeEventVerifier,
    DEFAULT_SIGNATURE_TOLERANCE_SECS,
};
