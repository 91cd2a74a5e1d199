pub trait Path {
    fn is_absolute(&self) -> bool;

    /// 非空的路径分量，忽略多余的`/`
    fn components(&self) -> impl Iterator<Item = &Self>;

    /// 返回路径的`(父目录, 文件名)`，与 `dirname`/`basename` 一致：
    ///
    /// - `"/a/b"` => `("/a", "b")`
    /// - `"/a/"` => `("/", "a")`
    /// - `"/"` => `("/", "/")`
    /// - `"a"` => `(".", "a")`
    fn parent_file(&self) -> (&Self, &Self);

    fn is_relative(&self) -> bool {
        !self.is_absolute()
    }
}

impl Path for str {
    fn is_absolute(&self) -> bool {
        self.starts_with('/')
    }

    fn components(&self) -> impl Iterator<Item = &Self> {
        self.split('/').filter(|s| !s.is_empty())
    }

    fn parent_file(&self) -> (&Self, &Self) {
        let trimmed = self.trim_end_matches('/');
        if trimmed.is_empty() {
            return if self.is_empty() { (".", ".") } else { ("/", "/") };
        }

        match trimmed.rsplit_once('/') {
            None => (".", trimmed),
            Some((parent, file)) => {
                let parent = parent.trim_end_matches('/');
                if parent.is_empty() {
                    ("/", file)
                } else {
                    (parent, file)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Path;

    #[test]
    fn parent_file() {
        assert_eq!("/a/b".parent_file(), ("/a", "b"));
        assert_eq!("/a".parent_file(), ("/", "a"));
        assert_eq!("/a/b/".parent_file(), ("/a", "b"));
        assert_eq!("//a//b".parent_file(), ("//a", "b"));
        assert_eq!("/".parent_file(), ("/", "/"));
        assert_eq!("a".parent_file(), (".", "a"));
    }

    #[test]
    fn components() {
        let cmps: Vec<_> = "//usr/./bin/".components().collect();
        assert_eq!(cmps, ["usr", ".", "bin"]);
        assert_eq!("/".components().count(), 0);
        assert!("/x".is_absolute());
        assert!("x/y".is_relative());
    }
}
