/// Calculate the SHA-1 hash of one or more byte slices concatenated.
#[macro_export]
macro_rules! sha1 {
    ( $( $x:expr ),+ ) => {{
        use $crate::__private::sha1::{Digest, Sha1};
        let mut h = Sha1::new();
        $( h.update($x); )+
        let out: [u8; 20] = h.finalize().into();
        out
    }};
}

/// Non-macro entry point for callers outside this crate, where the
/// `sha1!` macro's expansion of `sha1::{Digest, Sha1}` would otherwise
/// require the caller to depend on the `sha1` crate directly.
pub fn sha1_bytes(data: &[u8]) -> [u8; 20] {
    crate::sha1!(data)
}
