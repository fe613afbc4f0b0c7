pub mod json_lines_presenter;
