//! Uploaded file name flattening

use reqtrail_core::FileInput;

/// Client file names of every file in `input`, depth first in declaration order.
pub fn flatten_files(input: &FileInput) -> Vec<String> {
    let mut names = Vec::new();
    // Explicit stack, pushed in reverse so the next item popped is the next declared one
    let mut pending = vec![input];

    while let Some(item) = pending.pop() {
        match item {
            FileInput::File(file) => names.push(file.client_original_name.clone()),
            FileInput::List(items) => pending.extend(items.iter().rev()),
            FileInput::Map(entries) => pending.extend(entries.iter().rev().map(|(_, item)| item)),
        }
    }

    names
}

/// Flatten every upload field of a request, field by field.
pub fn flatten_request_files(fields: &[(String, FileInput)]) -> Vec<String> {
    fields
        .iter()
        .flat_map(|(_, input)| flatten_files(input))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqtrail_core::UploadedFile;

    fn file(name: &str) -> FileInput {
        FileInput::File(UploadedFile::new(name, "image/png", 10))
    }

    #[test]
    fn test_single_file() {
        assert_eq!(flatten_files(&file("a.png")), vec!["a.png"]);
    }

    #[test]
    fn test_nested_order() {
        let input = FileInput::map([
            ("first", file("1.png")),
            (
                "gallery",
                FileInput::list([
                    FileInput::list([file("2.png"), file("3.png")]),
                    FileInput::map([("cover", file("4.png"))]),
                ]),
            ),
            ("last", file("5.png")),
        ]);

        assert_eq!(
            flatten_files(&input),
            vec!["1.png", "2.png", "3.png", "4.png", "5.png"]
        );
    }

    #[test]
    fn test_empty_collections() {
        assert!(flatten_files(&FileInput::List(Vec::new())).is_empty());
        assert!(flatten_request_files(&[]).is_empty());
    }

    #[test]
    fn test_deep_nesting() {
        let mut input = file("deep.txt");
        for _ in 0..1_000 {
            input = FileInput::List(vec![input]);
        }
        assert_eq!(flatten_files(&input), vec!["deep.txt"]);
    }

    #[test]
    fn test_request_fields() {
        let fields = vec![
            ("avatar".to_string(), file("me.jpg")),
            ("docs".to_string(), FileInput::list([file("a.pdf"), file("b.pdf")])),
        ];
        assert_eq!(flatten_request_files(&fields), vec!["me.jpg", "a.pdf", "b.pdf"]);
    }
}
