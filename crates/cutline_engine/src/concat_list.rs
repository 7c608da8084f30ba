use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// The two-entry list file read by ffmpeg's concat demuxer.
///
/// The file lives as long as this value; dropping it deletes the file.
#[derive(Debug)]
pub struct ConcatList {
    file: NamedTempFile,
}

impl ConcatList {
    /// Write `first` then `second` as `file '<path>'` lines.
    ///
    /// ffmpeg resolves relative entries against the list's own directory, so
    /// both paths are made absolute against the current directory first.
    pub fn write(first: &Path, second: &Path) -> std::io::Result<Self> {
        let first = std::path::absolute(first)?;
        let second = std::path::absolute(second)?;
        let mut file = tempfile::Builder::new()
            .prefix("cutline-concat-")
            .suffix(".txt")
            .tempfile()?;
        file.write_all(render(&[first.as_path(), second.as_path()]).as_bytes())?;
        file.flush()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

fn render(entries: &[&Path]) -> String {
    entries
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', "'\\''")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_two_entries_in_stitch_order() {
        let list = ConcatList::write(Path::new("/media/a.mp4"), Path::new("/media/b.mp4")).unwrap();
        let text = std::fs::read_to_string(list.path()).unwrap();
        assert_eq!(text, "file '/media/a.mp4'\nfile '/media/b.mp4'\n");
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn relative_entries_resolve_against_working_dir() {
        let cwd = std::env::current_dir().unwrap();
        let list = ConcatList::write(Path::new("a.mp4"), Path::new("clips/b.mp4")).unwrap();
        let text = std::fs::read_to_string(list.path()).unwrap();
        assert_eq!(
            text,
            render(&[cwd.join("a.mp4").as_path(), cwd.join("clips/b.mp4").as_path()])
        );
        assert!(text.lines().all(|l| Path::new(&l[6..l.len() - 1]).is_absolute()));
    }

    #[test]
    fn escapes_single_quotes() {
        let text = render(&[Path::new("/media/it's.mp4")]);
        assert_eq!(text, "file '/media/it'\\''s.mp4'\n");
    }

    #[test]
    fn file_removed_on_drop() {
        let list = ConcatList::write(Path::new("a.mp4"), Path::new("b.mp4")).unwrap();
        let path = list.path().to_path_buf();
        assert!(path.exists());
        drop(list);
        assert!(!path.exists());
    }
}
