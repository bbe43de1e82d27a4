mod html_tests;
mod source_tests;
