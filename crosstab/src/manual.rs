/*!

This is the long-form manual for `crosstab` and `xtab`.

## Input formats

The following formats are supported:
* `xlsx` Excel workbook, for example the export of an online survey tool
* `csv` Comma Separated Values

In both cases the first row holds the column names, and each of the other
rows is one respondent. Column names must be unique: the questions and the
classification variables are found by their exact name.

### `xlsx`

The first worksheet is read, unless `excelWorksheetName` (or
`--excel-worksheet-name`) names another one. Numeric cells are kept as
numbers, which matters for the ages. Empty cells are missing answers.

### `csv`

```text
P3 - Medios SAT Utilizados,P36 - Edad,P37 - Género
"a. Presencial, b. Contact Center",34,M
a. Presencial,61,H
```

Multi-select answers hold commas, so they must be quoted. Blank cells are
missing answers.

## Questions

A target question is tabulated against every cross-variable. When the
configuration does not list the questions, every column named
`P<number> - <title>` with a number of at least `minQuestionNumber` (3 by
default) is a target question, in numerical order (`P11.1` comes after `P11`).

The options of a question are either listed in the configuration, or
discovered from the answers:
- a question is multi-select when one of its answers holds a comma. The
  columns of `singleValueColumns` are never multi-select: their labels
  contain commas.
- the options of a single-select question are its distinct answers, sorted.
  Numeric answers sort by value (`1`, `2`, `10`) before text answers.
- the answers of a multi-select question are split on commas. Options of the
  form `a. Label` come first, by letter. The others follow by decreasing
  frequency.

Multi-select answers are matched by substring: the answer
`"b. Contact Center, a. Presencial"` counts for both options, and is grouped
with `"a. Presencial, b. Contact Center"` in the breakdown of combinations.
For this reason no option of a multi-select question may be contained in
another option. A configured vocabulary like this is rejected. A discovered
one (a respondent wrote `Otro` next to the option `w. Otro`) skips the
question with an `overlappingOptions` warning, the other questions are
still tabulated.

## Cross-variables

A cross-variable has a name, a source column, an ordered list of categories
and a matching mode:
- `exact` the answer must be equal to the category
- `contains` the answer must contain the category. This is the mode for
  multi-select classification columns such as the languages.

The source column is a column of the input or a derived field. A
cross-variable may read the target question itself: the raw answer is
matched against its categories like any other column, so a cell counts the
respondents who selected the option and whose answer matches the category.

## Derived fields

Derived fields are computed for every respondent before any counting:
- `ageBracket`: `18-25`, `26-35`, `36-45`, `46-60`, `61+`. The upper bounds
  are included and fractional ages are truncated. Ages that cannot be read
  are missing, with a warning.
- `region`: a lookup table from locations to regions. Office names are
  matched exactly, customs posts are matched by substring (`matchMode`).
  Locations absent from the table are missing, with a warning.

## Conditional questions

Some questions only apply to the respondents who selected an option of an
earlier question. For example, the questions about the contact center only
apply when `P3 - Medios SAT Utilizados` contains `b. Contact Center`. For
such questions, the eligible respondents, and hence every percentage base,
are restricted to the respondents who passed the gate.

## Percentages

For each option:
- the total percentage is the share of the eligible respondents
- each cell is the share within the category, so the base is the number of
  eligible respondents in that category.

A base of zero, or a percentage that rounds to zero, is reported as "no
data" (`---` by default), never as `0`.

Rounding (`rules.rounding`):
- `roundHalfUp`: whole percents, `.5` goes up
- `truncateTwoDecimals`: two decimals, never rounded up

Total row (`rules.totalRow`):
- `sumOfRounded`: the sum of the printed percentages. This is what the
  historical reports do, including their rounding errors.
- `recomputeFromRaw`: the percentage of the summed counts, rounded once.

## Missing columns

Every column named by the configuration must exist in the input. Otherwise
the run stops before anything is counted. With
`rules.missingColumns = "zeroFill"`, an absent source column of a
cross-variable is counted as zero instead, with a warning.

 */
