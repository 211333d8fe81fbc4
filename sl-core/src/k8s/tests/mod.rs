mod selector_test;

use rstest::*;

use super::*;
