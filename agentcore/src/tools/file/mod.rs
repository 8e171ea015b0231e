//! File tools: read, write, edit, multiedit, apply_patch, glob, ls, create/delete,
//! replace_file_content. All share [`path::resolve_path_under`] for workspace-boundary
//! safety and, where the read-before-write invariant applies (§4.5), a common
//! [`crate::tools::read_tracker::ReadTracker`].

pub mod apply_patch;
pub mod create_delete;
pub mod edit_file;
pub mod glob;
pub mod ls;
pub mod multiedit;
pub mod path;
pub mod read_file;
pub mod replace_file_content;
pub mod write_file;

pub use apply_patch::{ApplyPatchTool, TOOL_APPLY_PATCH};
pub use create_delete::{
    CreateFileOrFolderTool, DeleteFileOrFolderTool, TOOL_CREATE_FILE_OR_FOLDER,
    TOOL_DELETE_FILE_OR_FOLDER,
};
pub use edit_file::{EditFileTool, TOOL_EDIT_FILE};
pub use glob::{GlobTool, TOOL_GLOB};
pub use ls::{LsTool, TOOL_LS};
pub use multiedit::{MultieditTool, TOOL_MULTIEDIT};
pub use path::resolve_path_under;
pub use read_file::{ReadFileTool, TOOL_READ_FILE};
pub use replace_file_content::{ReplaceFileContentTool, TOOL_REPLACE_FILE_CONTENT};
pub use write_file::{WriteFileTool, TOOL_WRITE_FILE};
