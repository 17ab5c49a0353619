use std::path::PathBuf;

use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants fall into two groups with very different propagation behaviour:
///
/// ## Structural errors (recovered internally)
/// - [`Error::Malformed`], [`Error::OutOfBounds`], [`Error::NotAnImage`], [`Error::Incompatible`]
///
/// These describe binaries that cannot be introspected or must not be loaded. Discovery
/// operations swallow them and simply treat the candidate as absent.
///
/// ## Lookup and invocation errors (surfaced to callers)
/// - [`Error::TypeNotFound`], [`Error::MemberNotFound`], [`Error::MethodNotFound`]
/// - [`Error::Construction`], [`Error::TypeConversion`]
///
/// These are raised by named lookups on [`crate::facade::TypeFacade`] and are expected to
/// propagate.
///
/// # Examples
///
/// ```rust,no_run
/// use modscope::{Error, image::ModuleImage};
///
/// let data = std::fs::read("plugin.dll")?;
/// match ModuleImage::parse(&data) {
///     Ok(image) => println!("managed: {}", image.is_managed()),
///     Err(Error::NotAnImage(reason)) => println!("not a module: {}", reason),
///     Err(e) => println!("other error: {}", e),
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // File parsing Errors
    /// The file is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This file type is not supported.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),

    /// The byte source is not a PE/CLI image.
    ///
    /// Returned by [`crate::image::ModuleImage::parse`] for truncated input, bad magic values
    /// or addresses that no section maps. Callers treat this as "no information available".
    #[error("Not a module image - {0}")]
    NotAnImage(String),

    /// The module exists but must not be loaded into this process.
    #[error("Module {path} can not be loaded - {reason}")]
    Incompatible {
        /// Path of the rejected module
        path: PathBuf,
        /// Why the compatibility gate refused it
        reason: String,
    },

    /// A type could not be resolved by name.
    #[error("Failed to find type - {0}")]
    TypeNotFound(String),

    /// A field or property could not be found on a type.
    #[error("Member '{member}' not found on type '{type_name}'")]
    MemberNotFound {
        /// Full name of the inspected type
        type_name: String,
        /// Requested member name
        member: String,
    },

    /// No method overload with the given name accepts the supplied arguments.
    #[error("Method '{method}' not found on type '{type_name}'")]
    MethodNotFound {
        /// Full name of the inspected type
        type_name: String,
        /// Requested method name
        method: String,
    },

    /// Creating an instance failed; the original cause is preserved as the source.
    #[error("Failed to construct '{type_name}' with arguments ({arguments})")]
    Construction {
        /// Full name of the type that failed to construct
        type_name: String,
        /// Rendered argument list
        arguments: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// The requested value conversion is not possible.
    #[error("Can not convert '{value}' to {target}")]
    TypeConversion {
        /// Rendered source value
        value: String,
        /// Name of the conversion target
        target: String,
    },

    /// Recursion limit reached.
    ///
    /// The associated value shows the limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// The configuration could not be read or is invalid.
    #[error("Invalid configuration - {0}")]
    Config(String),
}
