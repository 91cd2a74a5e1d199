use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("no such file or directory")]
    NotFound,
    #[error("file exists")]
    AlreadyExists,
    #[error("permission denied")]
    PermissionDenied,
    #[error("operation not permitted")]
    NotPermitted,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("file name too long")]
    NameTooLong,
    #[error("no space left on device")]
    NoSpace,
    #[error("directory not empty")]
    DirectoryNotEmpty,
    #[error("input/output error")]
    Io,
    #[error("bad file descriptor")]
    BadDescriptor,
    #[error("device or resource busy")]
    Busy,
    #[error("file too large")]
    FileTooLarge,
    #[error("too many links")]
    TooManyLinks,
    #[error("invalid file system format")]
    InvalidFormat,
}

impl Error {
    /// 对应的 POSIX 错误号（负数形式，系统调用层直接返回）
    pub fn errno(self) -> isize {
        let code = match self {
            Error::NotPermitted => 1,
            Error::NotFound => 2,
            Error::Io => 5,
            Error::BadDescriptor => 9,
            Error::PermissionDenied => 13,
            Error::Busy => 16,
            Error::AlreadyExists => 17,
            Error::NotADirectory => 20,
            Error::IsADirectory => 21,
            Error::InvalidArgument => 22,
            Error::FileTooLarge => 27,
            Error::NoSpace => 28,
            Error::TooManyLinks => 31,
            Error::NameTooLong => 36,
            Error::DirectoryNotEmpty => 39,
            Error::InvalidFormat => 117,
        };
        -code
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn errno() {
        assert_eq!(Error::NotFound.errno(), -2);
        assert_eq!(Error::NameTooLong.errno(), -36);
        assert_eq!(Error::DirectoryNotEmpty.errno(), -39);
    }
}
