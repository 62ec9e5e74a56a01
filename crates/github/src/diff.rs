/// Cut the patch for one file out of a multi-file unified diff.
///
/// Line-oriented scan with two states: outside a block, lines are
/// ignored unless they are a `diff --git` header naming the file;
/// inside a block, every line is kept until the next header line ends
/// it. Header lines are the only block boundaries, so hunk bodies,
/// binary-file and rename markers all pass through untouched.
///
/// GitHub file listings report post-image paths, so a header matches
/// when any of its whitespace-separated tokens equals `a/<filename>`
/// or `b/<filename>`; exact token comparison avoids matching files
/// whose paths merely contain `filename` as a substring.
///
/// Returns `None` when the diff carries no block for the file. The
/// caller treats that as "no patch available", not as an error.
pub fn extract_patch(diff: &str, filename: &str) -> Option<String> {
    let pre_image = format!("a/{filename}");
    let post_image = format!("b/{filename}");
    let mut patch: Vec<&str> = Vec::new();
    let mut recording = false;
    for line in diff.lines() {
        if line.starts_with("diff --git") {
            if recording {
                break;
            }
            if line.split_whitespace().any(|token| token == pre_image || token == post_image) {
                recording = true;
                patch.push(line);
            }
        } else if recording {
            patch.push(line);
        }
    }
    if patch.is_empty() { None } else { Some(patch.join("\n")) }
}

#[cfg(test)]
mod tests {
    use super::extract_patch;

    const DIFF: &str = "\
diff --git a/src/alpha.rs b/src/alpha.rs
index 1111111..2222222 100644
--- a/src/alpha.rs
+++ b/src/alpha.rs
@@ -1,3 +1,4 @@
 fn main() {
+    println!(\"hello\");
 }
diff --git a/src/beta.rs b/src/beta.rs
index 3333333..4444444 100644
--- a/src/beta.rs
+++ b/src/beta.rs
@@ -10,2 +10,3 @@
 const B: u32 = 2;
+const C: u32 = 3;
diff --git a/assets/logo.png b/assets/logo.png
Binary files a/assets/logo.png and b/assets/logo.png differ
";

    #[test]
    fn test_extracts_only_the_requested_block() {
        let patch = extract_patch(DIFF, "src/beta.rs").unwrap();
        assert!(patch.starts_with("diff --git a/src/beta.rs b/src/beta.rs"));
        assert!(patch.contains("+const C: u32 = 3;"));
        assert!(!patch.contains("alpha"));
        assert!(!patch.contains("logo.png"));
    }

    #[test]
    fn test_block_runs_to_end_of_input() {
        let patch = extract_patch(DIFF, "assets/logo.png").unwrap();
        assert!(patch.contains("Binary files"));
        assert_eq!(patch.lines().count(), 2);
    }

    #[test]
    fn test_absent_file_returns_none() {
        assert_eq!(extract_patch(DIFF, "src/gamma.rs"), None);
    }

    #[test]
    fn test_no_substring_false_positive() {
        // "src/beta.rs" must not match a header for "src/beta.rs.bak".
        let diff = "\
diff --git a/src/beta.rs.bak b/src/beta.rs.bak
@@ -1 +1 @@
-x
+y
";
        assert_eq!(extract_patch(diff, "src/beta.rs"), None);
    }

    #[test]
    fn test_rename_matches_post_image_path() {
        let diff = "\
diff --git a/old/name.rs b/new/name.rs
similarity index 90%
rename from old/name.rs
rename to new/name.rs
@@ -1 +1 @@
-x
+y
";
        // The file listing reports the post-image path.
        let patch = extract_patch(diff, "new/name.rs").unwrap();
        assert!(patch.contains("rename to new/name.rs"));
    }
}
