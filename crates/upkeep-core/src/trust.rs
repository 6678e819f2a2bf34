//! Publisher signature checks.
//!
//! The actual validation is delegated to a [`SignaturePrimitive`]. On
//! Windows that is Authenticode: `WinVerifyTrust` decides whether the
//! signature is valid, and PowerShell's `Get-AuthenticodeSignature` reports
//! the subject of the signer's leaf certificate. Other platforms have no
//! primitive and report [`TrustError::Unsupported`].

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use thiserror::Error;
use upkeep_schema::Signature;

#[derive(Error, Debug)]
pub enum TrustError {
    #[error("signature verification is not available on this platform")]
    Unsupported,

    #[error("failed to run signature check: {0}")]
    Io(#[from] std::io::Error),

    #[error("signature check failed: {0}")]
    Tool(String),
}

/// What the platform primitive reports about a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerInfo {
    /// The signature is present and structurally valid right now.
    pub valid: bool,
    /// Subject of the leaf certificate, if the file is signed at all.
    pub subject: Option<String>,
}

/// Platform signature validation.
pub trait SignaturePrimitive: Send + Sync {
    fn inspect(&self, path: &Path) -> Result<SignerInfo, TrustError>;
}

/// Authenticode validation.
#[derive(Debug, Default, Clone, Copy)]
pub struct Authenticode;

#[cfg(windows)]
const SUBJECT_SCRIPT: &str = "$s = Get-AuthenticodeSignature -LiteralPath $env:UPKEEP_SIGNED_FILE; \
     if ($s.SignerCertificate) { $s.SignerCertificate.Subject }";

#[cfg(windows)]
impl Authenticode {
    /// Run `WinVerifyTrust` with the generic Authenticode policy. Zero means valid.
    fn win_verify_trust(path: &Path) -> i32 {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;
        use windows::Win32::Foundation::{HANDLE, HWND};
        use windows::Win32::Security::WinTrust::{
            WINTRUST_ACTION_GENERIC_VERIFY_V2, WINTRUST_DATA, WINTRUST_DATA_0,
            WINTRUST_DATA_PROVIDER_FLAGS, WINTRUST_DATA_UICONTEXT, WINTRUST_FILE_INFO,
            WTD_CHOICE_FILE, WTD_REVOKE_NONE, WTD_STATEACTION_CLOSE, WTD_STATEACTION_VERIFY,
            WTD_UI_NONE, WinVerifyTrust,
        };
        use windows::core::{PCWSTR, PWSTR};

        let path_wide: Vec<u16> = OsStr::new(path)
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        let mut file_info = WINTRUST_FILE_INFO {
            cbStruct: std::mem::size_of::<WINTRUST_FILE_INFO>() as u32,
            pcwszFilePath: PCWSTR(path_wide.as_ptr()),
            hFile: HANDLE::default(),
            pgKnownSubject: std::ptr::null_mut(),
        };
        let mut trust_data = WINTRUST_DATA {
            cbStruct: std::mem::size_of::<WINTRUST_DATA>() as u32,
            pPolicyCallbackData: std::ptr::null_mut(),
            pSIPClientData: std::ptr::null_mut(),
            dwUIChoice: WTD_UI_NONE,
            fdwRevocationChecks: WTD_REVOKE_NONE,
            dwUnionChoice: WTD_CHOICE_FILE,
            Anonymous: WINTRUST_DATA_0 {
                pFile: &mut file_info,
            },
            dwStateAction: WTD_STATEACTION_VERIFY,
            hWVTStateData: HANDLE::default(),
            pwszURLReference: PWSTR::null(),
            dwProvFlags: WINTRUST_DATA_PROVIDER_FLAGS(0),
            dwUIContext: WINTRUST_DATA_UICONTEXT(0),
            pSignatureSettings: std::ptr::null_mut(),
        };

        let mut action = WINTRUST_ACTION_GENERIC_VERIFY_V2;
        // INVALID_HANDLE_VALUE as HWND: no UI.
        let no_window = HWND(-1isize as *mut std::ffi::c_void);
        let status = unsafe {
            WinVerifyTrust(
                no_window,
                &mut action,
                &mut trust_data as *mut _ as *mut std::ffi::c_void,
            )
        };

        // Release the state WinVerifyTrust kept for the verification.
        trust_data.dwStateAction = WTD_STATEACTION_CLOSE;
        unsafe {
            WinVerifyTrust(
                no_window,
                &mut action,
                &mut trust_data as *mut _ as *mut std::ffi::c_void,
            );
        }
        status
    }

    fn signer_subject(path: &Path) -> Result<Option<String>, TrustError> {
        let output = std::process::Command::new("powershell.exe")
            .args(["-NoProfile", "-NonInteractive", "-Command", SUBJECT_SCRIPT])
            .env("UPKEEP_SIGNED_FILE", path)
            .output()?;
        if !output.status.success() {
            return Err(TrustError::Tool(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(parse_signer_subject(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl SignaturePrimitive for Authenticode {
    #[cfg(windows)]
    fn inspect(&self, path: &Path) -> Result<SignerInfo, TrustError> {
        let status = Self::win_verify_trust(path);
        if status != 0 {
            tracing::debug!(path = %path.display(), "WinVerifyTrust returned 0x{status:08X}");
        }
        Ok(SignerInfo {
            valid: status == 0,
            subject: Self::signer_subject(path)?,
        })
    }

    #[cfg(not(windows))]
    fn inspect(&self, _path: &Path) -> Result<SignerInfo, TrustError> {
        Err(TrustError::Unsupported)
    }
}

/// First non-blank line of the subject script's output, if any.
pub fn parse_signer_subject(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

/// Result of checking a file against an expected [`Signature`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureCheck {
    /// Valid signature from the expected publisher.
    Verified,
    /// The declared expiration has passed; nothing was checked.
    Expired,
    /// Unsigned, tampered with, or otherwise not valid.
    Invalid,
    /// Valid signature, but from someone else.
    SubjectMismatch { actual: Option<String> },
    /// No primitive could be consulted.
    Unavailable(String),
}

pub struct TrustVerifier {
    primitive: Box<dyn SignaturePrimitive>,
}

impl fmt::Debug for TrustVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustVerifier").finish_non_exhaustive()
    }
}

impl Default for TrustVerifier {
    fn default() -> Self {
        Self::new(Authenticode)
    }
}

impl TrustVerifier {
    pub fn new(primitive: impl SignaturePrimitive + 'static) -> Self {
        Self {
            primitive: Box::new(primitive),
        }
    }

    /// True if `path` carries a currently valid signature whose leaf
    /// certificate subject equals `expected_subject` exactly.
    pub fn verify(&self, path: &Path, expected_subject: &str) -> bool {
        match self.primitive.inspect(path) {
            Ok(info) => info.valid && info.subject.as_deref() == Some(expected_subject),
            Err(e) => {
                tracing::debug!("Signature check of {} failed: {e}", path.display());
                false
            }
        }
    }

    /// Check `path` against `signature`, honoring its expiration.
    pub fn check(&self, path: &Path, signature: &Signature) -> SignatureCheck {
        self.check_at(path, signature, Utc::now())
    }

    pub fn check_at(&self, path: &Path, signature: &Signature, now: DateTime<Utc>) -> SignatureCheck {
        if signature.has_expired_at(now) {
            return SignatureCheck::Expired;
        }
        match self.primitive.inspect(path) {
            Err(TrustError::Unsupported) => {
                SignatureCheck::Unavailable(TrustError::Unsupported.to_string())
            }
            Err(e) => {
                tracing::debug!("Signature check of {} failed: {e}", path.display());
                SignatureCheck::Invalid
            }
            Ok(info) if !info.valid => SignatureCheck::Invalid,
            Ok(info) if info.subject.as_deref() != Some(signature.publisher.as_str()) => {
                SignatureCheck::SubjectMismatch {
                    actual: info.subject,
                }
            }
            Ok(_) => SignatureCheck::Verified,
        }
    }
}
