//! Error types for model loading.

use thiserror::Error;

/// Errors that can occur while loading a model description.
#[derive(Error, Debug)]
pub enum ModelError {
    /// The model file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path of the model file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not well-formed XML.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// An attribute could not be decoded.
    #[error("XML attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// The root element is not `<mujoco>`.
    #[error("Expected <mujoco> root element, found <{0}>")]
    UnexpectedRoot(String),

    /// The document ends before its root element is closed.
    #[error("Model document is truncated")]
    Truncated,

    /// The document has no root element.
    #[error("Model has no root element")]
    Empty,

    /// An attribute value is malformed.
    #[error("Invalid value {value:?} for attribute '{attribute}' of <{element}>")]
    InvalidAttribute {
        /// Element name.
        element: String,
        /// Attribute name.
        attribute: String,
        /// Offending value.
        value: String,
    },

    /// A required attribute is missing.
    #[error("Missing attribute '{attribute}' on <{element}>")]
    MissingAttribute {
        /// Element name.
        element: String,
        /// Attribute name.
        attribute: String,
    },

    /// An actuator references a joint that does not exist.
    #[error("Actuator {actuator:?} references unknown joint {joint:?}")]
    UnknownJoint {
        /// Actuator name, if any.
        actuator: String,
        /// Referenced joint name.
        joint: String,
    },

    /// The model uses a feature the physics backend cannot represent.
    #[error("Unsupported model construct: {0}")]
    Unsupported(String),
}
